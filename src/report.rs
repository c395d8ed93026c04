use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::mask::RunLengths;
use crate::palette::Palette;
use crate::pipeline::{encode_png, Segmentation};

pub const MODEL_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedClass {
    pub class_id: u8,
    pub label: String,
    pub color: [u8; 3],
}

/// Textual summary of one segmentation: sizes, RLE mask, coverage and,
/// optionally, the base64 PNG payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    /// `[height, width]` of the uploaded image
    pub original_size: [u32; 2],
    /// `[height, width]` of the class grid the RLE and percentages describe
    pub mask_size: [u32; 2],
    pub mask_rle: String,
    pub mask_rle_start: Option<u8>,
    pub mask_rle_classes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colored_mask_image: Option<String>,
    pub class_percentages: BTreeMap<u8, u32>,
    pub detected_classes: Vec<DetectedClass>,
    pub dominant_class: String,
}

impl SegmentationResult {
    pub fn from_segmentation(segmentation: &Segmentation, palette: &Palette) -> Self {
        let rle = RunLengths::encode(&segmentation.classes);
        let (width, height) = segmentation.original.dimensions();
        let (mask_width, mask_height) = segmentation.classes.dimensions();

        Self {
            original_size: [height, width],
            mask_size: [mask_height, mask_width],
            mask_rle: rle.counts_string(),
            mask_rle_start: rle.start_class(),
            mask_rle_classes: rle.classes_string(),
            overlay_image: None,
            colored_mask_image: None,
            class_percentages: segmentation.coverage.percentages.clone(),
            detected_classes: detected_classes(segmentation, palette),
            dominant_class: segmentation.coverage.dominant_label(palette).to_string(),
        }
    }

    /// Attaches the mask and overlay as base64 PNGs.
    pub fn with_images(mut self, segmentation: &Segmentation) -> Result<Self> {
        self.colored_mask_image = Some(B64.encode(encode_png(&segmentation.color_mask)?));
        if let Some(overlay) = &segmentation.overlay {
            self.overlay_image = Some(B64.encode(encode_png(overlay)?));
        }
        Ok(self)
    }
}

pub fn detected_classes(segmentation: &Segmentation, palette: &Palette) -> Vec<DetectedClass> {
    segmentation
        .coverage
        .detected()
        .filter_map(|class_id| {
            palette.get(class_id).map(|class| DetectedClass {
                class_id,
                label: class.label.clone(),
                color: class.color,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResponse {
    pub results: Vec<SegmentationResult>,
    pub execution_time_ms: u64,
    pub model_version: String,
}

impl SegmentationResponse {
    pub fn new(results: Vec<SegmentationResult>, execution_time_ms: u64) -> Self {
        Self {
            results,
            execution_time_ms,
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FixedScoreModel;
    use crate::pipeline::{OutputMode, SegmentOptions, Segmenter};
    use crate::mask::ClassIndexGrid;
    use image::RgbImage;
    use ndarray::{s, Array2};

    fn segment(mode: OutputMode) -> (Segmentation, Palette) {
        let mut data = Array2::<u8>::zeros((10, 10));
        data.slice_mut(s![0..2, 0..2]).fill(2);
        let grid = ClassIndexGrid::new(data);
        let segmenter = Segmenter::new(FixedScoreModel::from_grid(&grid, 3), Palette::pets()).unwrap();
        let options = SegmentOptions {
            mode,
            ..Default::default()
        };
        let segmentation = segmenter.segment_image(RgbImage::new(20, 30), options).unwrap();
        (segmentation, segmenter.palette().clone())
    }

    #[test]
    fn test_summary_fields() {
        let (segmentation, palette) = segment(OutputMode::Both);
        let result = SegmentationResult::from_segmentation(&segmentation, &palette);

        assert_eq!(result.original_size, [30, 20]);
        assert_eq!(result.mask_size, [10, 10]);
        assert_eq!(result.mask_rle_start, Some(2));
        assert_eq!(result.class_percentages.get(&0), Some(&96));
        assert_eq!(result.class_percentages.get(&2), Some(&4));
        assert_eq!(result.dominant_class, "cat");
        assert_eq!(
            result.detected_classes.iter().map(|c| c.class_id).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert!(result.overlay_image.is_none());
    }

    #[test]
    fn test_rle_decodes_back() -> Result<()> {
        let (segmentation, palette) = segment(OutputMode::Overlay);
        let result = SegmentationResult::from_segmentation(&segmentation, &palette);

        let [height, width] = result.mask_size;
        let decoded = RunLengths::parse(&result.mask_rle, &result.mask_rle_classes)?.decode(width, height)?;
        assert_eq!(decoded, segmentation.classes);
        Ok(())
    }

    #[test]
    fn test_images_are_base64_png() -> Result<()> {
        let (segmentation, palette) = segment(OutputMode::Both);
        let result = SegmentationResult::from_segmentation(&segmentation, &palette).with_images(&segmentation)?;

        let mask = B64.decode(result.colored_mask_image.as_deref().unwrap()).unwrap();
        let decoded = image::load_from_memory(&mask)?;
        assert_eq!((decoded.width(), decoded.height()), (20, 30));
        assert!(result.overlay_image.is_some());

        let json = serde_json::to_value(SegmentationResponse::new(vec![result], 5)).unwrap();
        assert_eq!(json["model_version"], "1.0");
        assert_eq!(json["results"][0]["class_percentages"]["0"], 96);
        Ok(())
    }
}
