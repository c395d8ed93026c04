use image::{Rgb, RgbImage};

use crate::errors::{PetSegError, Result};
use crate::mask::ClassIndexGrid;
use crate::palette::Palette;

/// Maps every class index to its palette color.
///
/// The whole grid is checked up front, so a model/palette mismatch fails
/// with `UnknownClassIndex` instead of producing a partially black mask.
pub fn colorize(grid: &ClassIndexGrid, palette: &Palette) -> Result<RgbImage> {
    let lut = palette
        .classes()
        .iter()
        .map(|class| Rgb(class.color))
        .collect::<Vec<_>>();

    if let Some(max) = grid.max_index() {
        palette.color(max)?;
    }

    let (width, height) = grid.dimensions();
    let pixels = grid
        .iter()
        .flat_map(|index| lut[usize::from(index)].0)
        .collect::<Vec<u8>>();

    let actual_len = pixels.len();
    RgbImage::from_raw(width, height, pixels).ok_or(PetSegError::DimensionMismatch {
        expected: (width, height),
        actual: (actual_len as u32 / 3, 1),
    })
}

/// Nearest-neighbour upscale to `width`×`height`, then colorize.
pub fn colorize_at(
    grid: &ClassIndexGrid,
    palette: &Palette,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    colorize(&grid.resize_nearest(width, height), palette)
}
