use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2};

use crate::errors::{PetSegError, Result};

/// Per-pixel class indices at a fixed resolution, stored row-major as
/// `(height, width)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndexGrid {
    data: Array2<u8>,
}

impl ClassIndexGrid {
    pub fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    pub fn from_rows(rows: &[&[u8]]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        if rows.iter().any(|row| row.len() != width) {
            return Err(PetSegError::validation("grid", "rows have different lengths"));
        }
        let flat = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Ok(Self::new(Array2::from_shape_vec((height, width), flat)?))
    }

    pub fn from_flat(width: u32, height: u32, flat: Vec<u8>) -> Result<Self> {
        Ok(Self::new(Array2::from_shape_vec(
            (height as usize, width as usize),
            flat,
        )?))
    }

    pub fn filled(width: u32, height: u32, class: u8) -> Self {
        Self::new(Array2::from_elem((height as usize, width as usize), class))
    }

    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    /// `(width, height)`, matching `image::GenericImageView::dimensions`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.data.get((y as usize, x as usize)).copied()
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    /// Row-major iteration over all indices.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.iter().copied()
    }

    pub fn max_index(&self) -> Option<u8> {
        self.iter().max()
    }

    /// Nearest-neighbour resample to `width`×`height`.
    ///
    /// Each output pixel copies source pixel `floor(dst * src_len / dst_len)`
    /// so no intermediate class index is ever produced.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let (src_w, src_h) = (self.data.ncols(), self.data.nrows());
        if src_w == 0 || src_h == 0 {
            return Self::filled(width, height, 0);
        }
        let (dst_w, dst_h) = (width as usize, height as usize);
        let data = Array2::from_shape_fn((dst_h, dst_w), |(y, x)| {
            let sy = y * src_h / dst_h;
            let sx = x * src_w / dst_w;
            self.data[(sy, sx)]
        });
        Self::new(data)
    }

    /// The raw indices as an 8-bit grayscale image.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([self.data[(y as usize, x as usize)]])
        })
    }
}
