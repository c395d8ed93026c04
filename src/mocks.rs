use crate::errors::Result;
use crate::mask::ClassIndexGrid;
use crate::traits::SegmentationModel;
use ndarray::prelude::*;

/// テスト用のモックセグメンテーションモデル
///
/// 入力に関係なく、事前に決めたスコアを返す。
#[derive(Debug, Clone)]
pub struct FixedScoreModel {
    scores: Array3<f32>,
}

impl FixedScoreModel {
    /// Every pixel gets the same score vector.
    pub fn uniform(width: u32, height: u32, scores: &[f32]) -> Self {
        let scores = Array3::from_shape_fn(
            (height as usize, width as usize, scores.len()),
            |(_, _, c)| scores[c],
        );
        Self { scores }
    }

    /// One-hot scores that reduce back to `grid`.
    pub fn from_grid(grid: &ClassIndexGrid, num_classes: usize) -> Self {
        let view = grid.view();
        let (height, width) = view.dim();
        let scores = Array3::from_shape_fn((height, width, num_classes), |(y, x, c)| {
            if usize::from(view[(y, x)]) == c {
                1.0
            } else {
                0.0
            }
        });
        Self { scores }
    }
}

impl SegmentationModel for FixedScoreModel {
    fn input_size(&self) -> (u32, u32) {
        let (height, width, _) = self.scores.dim();
        (width as u32, height as u32)
    }

    fn num_classes(&self) -> usize {
        self.scores.len_of(Axis(2)).max(2)
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        let batch = tensor.len_of(Axis(0));
        let (height, width, channels) = self.scores.dim();
        let mut out = Array4::zeros((batch, height, width, channels));
        for mut item in out.outer_iter_mut() {
            item.assign(&self.scores);
        }
        Ok(out)
    }
}

/// テスト用のファクトリー関数: 全画素が背景のモデル
pub fn create_mock_model() -> FixedScoreModel {
    FixedScoreModel::uniform(128, 128, &[0.9, 0.05, 0.05])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_model_creation() {
        let mock = create_mock_model();
        assert_eq!(mock.input_size(), (128, 128));
        assert_eq!(mock.num_classes(), 3);
    }

    #[test]
    fn test_mock_model_predict() -> Result<()> {
        let mock = FixedScoreModel::uniform(16, 8, &[0.1, 0.9]);
        let input_tensor = Array4::<f32>::zeros((1, 8, 16, 3));

        let result = mock.predict(input_tensor.view())?;
        assert_eq!(result.shape(), &[1, 8, 16, 2]);
        assert!((result[[0, 3, 4, 1]] - 0.9).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_from_grid_is_one_hot() -> Result<()> {
        let grid = ClassIndexGrid::from_rows(&[&[0, 2], &[1, 0]])?;
        let mock = FixedScoreModel::from_grid(&grid, 3);
        assert_eq!(mock.input_size(), (2, 2));

        let result = mock.predict(Array4::<f32>::zeros((1, 2, 2, 3)).view())?;
        assert_eq!(result[[0, 0, 1, 2]], 1.0);
        assert_eq!(result[[0, 0, 1, 0]], 0.0);
        assert_eq!(result[[0, 1, 0, 1]], 1.0);
        Ok(())
    }
}
