use std::fs;
use std::path::PathBuf;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use pet_seg_rs::mask::{ClassIndexGrid, RunLengths};
use pet_seg_rs::mocks::FixedScoreModel;
use pet_seg_rs::pipeline::encode_png;
use pet_seg_rs::{
    BatchConfig, ImageProcessor, OutputMode, Palette, PetSegError, SegmentOptions,
    SegmentationResult, Segmenter,
};

/// 4x4 model grid: a 2x2 dog in the top-left corner, a cat column on the right.
fn pets_grid() -> ClassIndexGrid {
    ClassIndexGrid::from_rows(&[
        &[1, 1, 0, 2],
        &[1, 1, 0, 2],
        &[0, 0, 0, 2],
        &[0, 0, 0, 2],
    ])
    .unwrap()
}

fn segmenter() -> Segmenter<FixedScoreModel> {
    Segmenter::new(FixedScoreModel::from_grid(&pets_grid(), 3), Palette::pets()).unwrap()
}

fn gray_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([100, 100, 100]))
}

#[test]
fn test_mask_keeps_source_resolution() {
    let segmentation = segmenter()
        .segment_image(gray_image(8, 6), SegmentOptions::default())
        .unwrap();

    assert_eq!(segmentation.color_mask.dimensions(), (8, 6));
    assert_eq!(segmentation.overlay.as_ref().unwrap().dimensions(), (8, 6));
    assert_eq!(segmentation.classes.dimensions(), (4, 4));

    // nearest upscale: top-left source pixel maps to the dog block
    assert_eq!(*segmentation.color_mask.get_pixel(0, 0), Rgb([255, 0, 0]));
    assert_eq!(*segmentation.color_mask.get_pixel(7, 5), Rgb([0, 255, 0]));
}

#[test]
fn test_mask_colors_come_from_palette() {
    let palette = Palette::pets();
    let segmentation = segmenter()
        .segment_image(gray_image(16, 16), SegmentOptions::default())
        .unwrap();

    for pixel in segmentation.color_mask.pixels() {
        assert!(
            palette.classes().iter().any(|class| class.color == pixel.0),
            "unexpected mask color {:?}",
            pixel.0
        );
    }
}

#[test]
fn test_overlay_blends_with_rounding() {
    let options = SegmentOptions {
        alpha: 0.4,
        ..Default::default()
    };
    let segmentation = segmenter().segment_image(gray_image(4, 4), options).unwrap();
    let overlay = segmentation.overlay.unwrap();

    // dog: 0.6 * 100 + 0.4 * 255 = 162
    assert_eq!(*overlay.get_pixel(0, 0), Rgb([162, 60, 60]));
    // background stays darker than the source
    assert_eq!(*overlay.get_pixel(2, 2), Rgb([60, 60, 60]));
}

#[test]
fn test_color_mode_skips_overlay() {
    let options = SegmentOptions {
        mode: OutputMode::Color,
        ..Default::default()
    };
    let segmentation = segmenter().segment_image(gray_image(4, 4), options).unwrap();
    assert!(segmentation.overlay.is_none());
}

#[test]
fn test_summary_matches_grid() {
    let segmentation = segmenter()
        .segment_image(gray_image(32, 32), SegmentOptions::default())
        .unwrap();
    let summary = SegmentationResult::from_segmentation(&segmentation, &Palette::pets());

    assert_eq!(summary.original_size, [32, 32]);
    assert_eq!(summary.mask_size, [4, 4]);
    // 8 background, 4 dog, 4 cat out of 16
    assert_eq!(summary.class_percentages.get(&0), Some(&50));
    assert_eq!(summary.class_percentages.get(&1), Some(&25));
    assert_eq!(summary.class_percentages.get(&2), Some(&25));
    assert_eq!(summary.dominant_class, "dog");
    let detected: Vec<u8> = summary.detected_classes.iter().map(|c| c.class_id).collect();
    assert_eq!(detected, vec![0, 1, 2]);

    let rle = RunLengths::parse(&summary.mask_rle, &summary.mask_rle_classes).unwrap();
    assert_eq!(rle.start_class(), summary.mask_rle_start);
    assert_eq!(rle.decode(4, 4).unwrap(), pets_grid());
}

#[test]
fn test_all_background_reports_background() {
    let segmenter = Segmenter::new(
        FixedScoreModel::uniform(8, 8, &[0.9, 0.05, 0.05]),
        Palette::pets(),
    )
    .unwrap();
    let segmentation = segmenter
        .segment_image(gray_image(8, 8), SegmentOptions::default())
        .unwrap();
    let summary = SegmentationResult::from_segmentation(&segmentation, segmenter.palette());

    assert_eq!(summary.dominant_class, "background");
    assert_eq!(summary.detected_classes.len(), 1);
    assert_eq!(summary.detected_classes[0].class_id, 0);
    assert_eq!(summary.detected_classes[0].label, "background");
    assert_eq!(summary.detected_classes[0].color, [0, 0, 0]);
    assert_eq!(summary.mask_rle, "64");
}

#[test]
fn test_segment_bytes_rejects_garbage() {
    let result = segmenter().segment_bytes(b"definitely not an image", SegmentOptions::default());
    assert!(matches!(result, Err(PetSegError::InvalidImage { .. })));
}

#[test]
fn test_unavailable_segmenter() {
    let segmenter: Segmenter<FixedScoreModel> = Segmenter::unavailable(Palette::pets(), "no model");
    let png = encode_png(&gray_image(4, 4)).unwrap();
    let result = segmenter.segment_bytes(&png, SegmentOptions::default());
    assert!(matches!(result, Err(PetSegError::ModelUnavailable { .. })));
}

#[test]
fn test_palette_must_match_model() {
    let result = Segmenter::new(FixedScoreModel::uniform(4, 4, &[0.1, 0.9]), Palette::pets());
    assert!(matches!(result, Err(PetSegError::Configuration { .. })));
}

fn batch_config(input_dir: PathBuf, output_dir: PathBuf, mode: OutputMode) -> BatchConfig {
    BatchConfig {
        input_dir,
        output_dir,
        format: "png".to_string(),
        mode,
        alpha: 0.4,
        threshold: 0.5,
        num_threads: 2,
    }
}

#[test]
fn test_directory_processing_mirrors_tree() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(input_dir.join("nested")).unwrap();

    gray_image(10, 10).save(input_dir.join("a.png")).unwrap();
    gray_image(12, 8).save(input_dir.join("nested/b.jpg")).unwrap();
    fs::write(input_dir.join("notes.txt"), "skip me").unwrap();

    let processor = ImageProcessor::new(
        segmenter(),
        batch_config(input_dir, output_dir.clone(), OutputMode::Overlay),
    );
    let summary = processor.process_directory().unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert!(output_dir.join("a.png").exists());
    let nested = image::open(output_dir.join("nested/b.png")).unwrap();
    assert_eq!((nested.width(), nested.height()), (12, 8));
}

#[test]
fn test_directory_processing_both_mode() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(&input_dir).unwrap();
    gray_image(8, 8).save(input_dir.join("pet.png")).unwrap();

    let processor = ImageProcessor::new(
        segmenter(),
        batch_config(input_dir, output_dir.clone(), OutputMode::Both),
    );
    processor.process_directory().unwrap();

    assert!(output_dir.join("pet.mask.png").exists());
    assert!(output_dir.join("pet.overlay.png").exists());
    let json = fs::read_to_string(output_dir.join("pet.json")).unwrap();
    let summary: SegmentationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(summary.dominant_class, "dog");
    assert!(summary.colored_mask_image.is_none());
}

#[test]
fn test_directory_processing_counts_failures() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    fs::create_dir_all(&input_dir).unwrap();
    gray_image(8, 8).save(input_dir.join("good.png")).unwrap();
    fs::write(input_dir.join("broken.png"), b"not a png").unwrap();

    let processor = ImageProcessor::new(
        segmenter(),
        batch_config(input_dir, temp_dir.path().join("output"), OutputMode::Color),
    );
    let summary = processor.process_directory().unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
}
