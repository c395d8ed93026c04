pub mod colorize;
pub mod composite;
pub mod coverage;
mod grid;
pub mod reduce;
pub mod rle;

pub use colorize::colorize;
pub use composite::blend;
pub use coverage::{summarize, ClassCoverage};
pub use grid::ClassIndexGrid;
pub use reduce::reduce_scores;
pub use rle::{Run, RunLengths};

use num_traits::{Bounded, NumCast};
use std::any::TypeId;

pub fn is_floating_point<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<f32>() || TypeId::of::<T>() == TypeId::of::<f64>()
}

/// Channel maximum: 1.0 for floating point subpixels, `T::max_value()` otherwise.
pub fn get_max_value<T: Bounded + NumCast + 'static>() -> T {
    if is_floating_point::<T>() {
        T::from(1.0).unwrap_or_else(T::max_value)
    } else {
        T::max_value()
    }
}
