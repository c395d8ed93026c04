use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Pixel, PixelWithColorType, RgbImage};
use ndarray::Axis;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{PetSegError, Result};
use crate::mask::{
    self, colorize::colorize_at, composite::DEFAULT_ALPHA, reduce::DEFAULT_THRESHOLD,
    ClassCoverage, ClassIndexGrid,
};
use crate::model::preprocess;
use crate::palette::Palette;
use crate::traits::SegmentationModel;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Colorized class mask only
    Color,
    /// Mask blended over the source image
    #[default]
    Overlay,
    /// Mask, overlay and a textual summary
    Both,
}

impl OutputMode {
    pub const fn wants_mask(self) -> bool {
        matches!(self, Self::Color | Self::Both)
    }

    pub const fn wants_overlay(self) -> bool {
        matches!(self, Self::Overlay | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentOptions {
    pub mode: OutputMode,
    pub alpha: f32,
    pub threshold: f32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            alpha: DEFAULT_ALPHA,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl SegmentOptions {
    pub fn validate(&self) -> Result<()> {
        mask::composite::validate_alpha(self.alpha)?;
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PetSegError::validation(
                "threshold",
                format!("must be within [0, 1], got {}", self.threshold),
            ));
        }
        Ok(())
    }
}

/// Everything one pipeline run produced for a single image.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub original: RgbImage,
    /// Class indices at the model resolution.
    pub classes: ClassIndexGrid,
    /// Colorized mask at the source resolution.
    pub color_mask: RgbImage,
    pub overlay: Option<RgbImage>,
    pub coverage: ClassCoverage,
}

/// Read-only segmentation context: the loaded model (if any) and the color
/// table, shared by every request.
pub struct Segmenter<M: SegmentationModel> {
    model: Option<M>,
    palette: Palette,
    unavailable_reason: String,
}

impl<M: SegmentationModel> Segmenter<M> {
    /// Fails when the palette does not cover exactly the model's classes.
    pub fn new(model: M, palette: Palette) -> Result<Self> {
        palette.ensure_matches(model.num_classes())?;
        Ok(Self {
            model: Some(model),
            palette,
            unavailable_reason: String::new(),
        })
    }

    /// A context whose every request fails with `ModelUnavailable`.
    pub fn unavailable(palette: Palette, reason: impl Into<String>) -> Self {
        Self {
            model: None,
            palette,
            unavailable_reason: reason.into(),
        }
    }

    pub const fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn model_input_size(&self) -> Option<(u32, u32)> {
        self.model.as_ref().map(|model| model.input_size())
    }

    fn model(&self) -> Result<&M> {
        self.model.as_ref().ok_or_else(|| PetSegError::ModelUnavailable {
            reason: self.unavailable_reason.clone(),
        })
    }

    /// Decode → classify → colorize → composite.
    pub fn segment_bytes(&self, bytes: &[u8], options: SegmentOptions) -> Result<Segmentation> {
        self.model()?;
        let image = decode_image(bytes)?;
        self.segment_image(image, options)
    }

    pub fn segment_image(&self, original: RgbImage, options: SegmentOptions) -> Result<Segmentation> {
        options.validate()?;
        let classes = self.classify(&original, options.threshold)?;
        let (width, height) = original.dimensions();

        let color_mask = colorize_at(&classes, &self.palette, width, height)?;
        let overlay = if options.mode.wants_overlay() {
            Some(mask::blend(&original, &color_mask, options.alpha)?)
        } else {
            None
        };
        let coverage = mask::summarize(&classes);

        Ok(Segmentation {
            original,
            classes,
            color_mask,
            overlay,
            coverage,
        })
    }

    /// Model-resolution class grid for `image`.
    pub fn classify(&self, image: &RgbImage, threshold: f32) -> Result<ClassIndexGrid> {
        let model = self.model()?;
        let tensor = preprocess(image, model.input_size());
        let scores = model.predict(tensor.view())?;
        if scores.len_of(Axis(0)) == 0 {
            return Err(PetSegError::Model {
                operation: "inference".to_string(),
                source: "model returned an empty batch".into(),
            });
        }
        mask::reduce_scores(scores.index_axis(Axis(0), 0), threshold)
    }

    /// Runs the pipeline over several uploads in parallel; the first failure
    /// aborts the whole batch.
    pub fn segment_many(&self, uploads: &[Vec<u8>], options: SegmentOptions) -> Result<Vec<Segmentation>> {
        self.model()?;
        uploads
            .par_iter()
            .map(|bytes| self.segment_bytes(bytes, options))
            .collect()
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(PetSegError::InvalidImage {
            reason: "empty upload".to_string(),
        });
    }
    Ok(image::load_from_memory(bytes)?.into_rgb8())
}

pub fn encode_png<P>(image: &ImageBuffer<P, Vec<u8>>) -> Result<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType,
{
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| PetSegError::Encoding {
            operation: "png encode".to_string(),
            source: Box::new(e),
        })?;
    Ok(buffer)
}
