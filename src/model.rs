use std::path::Path;

use crate::{
    errors::{PetSegError, Result},
    traits::SegmentationModel,
};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;

/// Input resolution used when the model declares dynamic spatial dims.
pub const FALLBACK_INPUT_SIZE: u32 = 128;

pub struct OnnxModel {
    input_size: (u32, u32),
    num_classes: usize,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let model_err = |operation: String| {
            move |e: ort::Error| PetSegError::Model {
                operation,
                source: Box::new(e),
            }
        };

        let mut session = SessionBuilder::new()
            .map_err(model_err("session builder init".to_string()))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(model_err("execution provider setup".to_string()))?
            .with_memory_pattern(true)
            .map_err(model_err("memory pattern setup".to_string()))?
            .commit_from_file(model_path)
            .map_err(model_err(format!("model load: {}", model_path.display())))?;

        let input = session.inputs.first().ok_or_else(|| PetSegError::ModelUnavailable {
            reason: "model declares no inputs".to_string(),
        })?;
        let input_name = input.name.clone();
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let input_size = spatial_size(&dims);
        if dims.len() == 4 && dims[3] != 3 && dims[3] > 0 {
            tracing::warn!(?dims, "model input is not NHWC with 3 channels");
        }

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| PetSegError::ModelUnavailable {
                reason: "model declares no outputs".to_string(),
            })?;

        // warm-up run; also tells us the class axis when it is dynamic
        let (width, height) = input_size;
        let data = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
        let channels = {
            let outputs = session
                .run(ort::inputs![
                    input_name.as_str() => TensorRef::from_array_view(&data)
                        .map_err(model_err("warm-up tensor".to_string()))?
                ])
                .map_err(model_err("warm-up run".to_string()))?;
            let scores = outputs[output_name.as_str()].try_extract_array::<f32>()?;
            scores.shape().last().copied().unwrap_or(0)
        };
        if channels == 0 {
            return Err(PetSegError::ModelUnavailable {
                reason: "model output has no class axis".to_string(),
            });
        }

        tracing::info!(
            path = %model_path.display(),
            width,
            height,
            channels,
            "model loaded"
        );

        Ok(Self {
            input_size,
            num_classes: channels.max(2),
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }
}

impl SegmentationModel for OnnxModel {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        let mut binding = self.session.lock();
        let outputs = binding.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;
        Ok(outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .to_owned())
    }
}

/// `(width, height)` from an `[N, H, W, C]` shape, falling back when the
/// spatial dims are dynamic or missing.
fn spatial_size(dims: &[i64]) -> (u32, u32) {
    match dims {
        [_, h, w, _] => match (u32::try_from(*w), u32::try_from(*h)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => (FALLBACK_INPUT_SIZE, FALLBACK_INPUT_SIZE),
        },
        _ => (FALLBACK_INPUT_SIZE, FALLBACK_INPUT_SIZE),
    }
}

/// Resize to the model resolution and scale to `[0, 1]` as a
/// `[1, H, W, 3]` tensor.
pub fn preprocess(image: &RgbImage, (width, height): (u32, u32)) -> Array4<f32> {
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    resized
        .as_ndarray3()
        .permuted_axes([1, 2, 0])
        .mapv(|v| f32::from(v) / 255.0)
        .insert_axis(Axis(0))
}
