pub mod artifacts;
pub mod config;
pub mod errors;
pub mod http;
pub mod image_processor;
pub mod mask;
pub mod model;
pub mod palette;
pub mod pipeline;
pub mod report;
pub mod traits;

pub mod mocks;

pub use artifacts::ArtifactStore;
pub use config::{BatchConfig, Cli, Command, ModelConfig, ServeConfig};
pub use errors::{PetSegError, Result};
pub use image_processor::{BatchSummary, ImageProcessor};
pub use model::OnnxModel;
pub use palette::{ClassInfo, Palette};
pub use pipeline::{OutputMode, SegmentOptions, Segmentation, Segmenter};
pub use report::{SegmentationResponse, SegmentationResult};
pub use traits::*;

/// Loads the palette and the ONNX model named by `config`.
///
/// A model that fails to load leaves the segmenter in the unavailable state
/// unless `require_model` is set.
pub fn load_segmenter(config: &ModelConfig) -> Result<Segmenter<OnnxModel>> {
    let palette = match &config.palette {
        Some(path) => Palette::from_json_file(path)?,
        None => Palette::pets(),
    };

    match OnnxModel::new(&config.model_path, config.device_id) {
        Ok(model) => Segmenter::new(model, palette),
        Err(e) if !config.require_model => {
            tracing::error!(
                path = %config.model_path.display(),
                error = %e,
                "model failed to load, serving without inference"
            );
            Ok(Segmenter::unavailable(palette, e.to_string()))
        }
        Err(e) => Err(e),
    }
}
