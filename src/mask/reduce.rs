use ndarray::{ArrayView3, Axis};

use crate::errors::{PetSegError, Result};
use crate::mask::ClassIndexGrid;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Collapses `(H, W, C)` scores into one class index per pixel.
///
/// With several channels the highest score wins and ties go to the lowest
/// index. A single channel is a binary mask: `score > threshold` is class 1.
pub fn reduce_scores(scores: ArrayView3<f32>, threshold: f32) -> Result<ClassIndexGrid> {
    let channels = scores.len_of(Axis(2));
    match channels {
        0 => Err(PetSegError::Model {
            operation: "mask reduction".to_string(),
            source: "model output has no class channel".into(),
        }),
        1 => Ok(ClassIndexGrid::new(
            scores
                .index_axis(Axis(2), 0)
                .mapv(|score| u8::from(score > threshold)),
        )),
        c if c > usize::from(u8::MAX) + 1 => Err(PetSegError::Model {
            operation: "mask reduction".to_string(),
            source: format!("{c} classes do not fit a u8 class index").into(),
        }),
        _ => Ok(ClassIndexGrid::new(scores.map_axis(Axis(2), |class_scores| {
            let mut best = 0usize;
            let mut best_score = class_scores[0];
            for (index, &score) in class_scores.iter().enumerate().skip(1) {
                // NaN compares false, so it never displaces the current winner
                if score > best_score || (best_score.is_nan() && !score.is_nan()) {
                    best = index;
                    best_score = score;
                }
            }
            best as u8
        }))),
    }
}
