use crate::errors::Result;
use ndarray::prelude::*;

/// 画像セグメンテーションモデルの抽象化
///
/// 具象モデル（ONNX Runtime）ではなくこのトレイトに依存することで、
/// テストでは固定スコアを返すモックに差し替えられる。
pub trait SegmentationModel: Send + Sync {
    /// モデルの入力画像サイズ `(width, height)`
    fn input_size(&self) -> (u32, u32);

    /// 予測クラス数（1チャンネル出力の二値モデルは2クラス）
    fn num_classes(&self) -> usize;

    /// テンソル予測: `[1, H, W, 3]` → `[1, H, W, C]`
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>>;
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        (**self).predict(tensor)
    }
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for std::sync::Arc<M> {
    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        (**self).predict(tensor)
    }
}
