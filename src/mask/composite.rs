use image::{GenericImageView, ImageBuffer, Pixel, Primitive, Rgb};
use num_traits::AsPrimitive;

use crate::errors::{PetSegError, Result};
use crate::mask::{get_max_value, is_floating_point};

pub const DEFAULT_ALPHA: f32 = 0.4;

pub fn validate_alpha(alpha: f32) -> Result<f32> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(PetSegError::validation("alpha", format!("must be within [0, 1], got {alpha}")));
    }
    Ok(alpha)
}

/// `original * (1 - alpha) + mask * alpha` per channel, rounded and clamped
/// to the subpixel range.
///
/// `alpha == 0` reproduces `original` and `alpha == 1` reproduces `mask`
/// exactly.
pub fn blend<I, M, S>(original: &I, mask: &M, alpha: f32) -> Result<ImageBuffer<Rgb<S>, Vec<S>>>
where
    I: GenericImageView<Pixel = Rgb<S>>,
    M: GenericImageView<Pixel = Rgb<S>>,
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32> + 'static,
    f32: AsPrimitive<S>,
{
    let alpha = validate_alpha(alpha)?;
    if original.dimensions() != mask.dimensions() {
        return Err(PetSegError::DimensionMismatch {
            expected: original.dimensions(),
            actual: mask.dimensions(),
        });
    }

    let max: f32 = get_max_value::<S>().as_();
    let integral = !is_floating_point::<S>();
    let keep = 1.0 - alpha;

    let processed_pixels = original
        .pixels()
        .zip(mask.pixels())
        .flat_map(|((_, _, Rgb(base)), (_, _, Rgb(color)))| {
            let mut out = [S::zero(); 3];
            for ((o, b), c) in out.iter_mut().zip(base).zip(color) {
                let value = b.as_() * keep + c.as_() * alpha;
                let value = if integral { value.round() } else { value };
                *o = num_traits::clamp(value, 0.0, max).as_();
            }
            out
        })
        .collect::<Vec<S>>();

    let (width, height) = original.dimensions();
    ImageBuffer::from_raw(width, height, processed_pixels).ok_or(PetSegError::DimensionMismatch {
        expected: (width, height),
        actual: mask.dimensions(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 40) as u8, (y * 60) as u8, ((x + y) * 25) as u8])
        })
    }

    #[test]
    fn test_alpha_zero_is_original() -> Result<()> {
        let original = gradient(5, 4);
        let mask = RgbImage::from_pixel(5, 4, Rgb([255, 0, 0]));
        assert_eq!(blend(&original, &mask, 0.0)?, original);
        Ok(())
    }

    #[test]
    fn test_alpha_one_is_mask() -> Result<()> {
        let original = gradient(5, 4);
        let mask = RgbImage::from_fn(5, 4, |x, _| {
            if x % 2 == 0 {
                Rgb([0, 255, 0])
            } else {
                Rgb([0, 0, 0])
            }
        });
        assert_eq!(blend(&original, &mask, 1.0)?, mask);
        Ok(())
    }

    #[test]
    fn test_rounded_blend() -> Result<()> {
        let original = RgbImage::from_pixel(1, 1, Rgb([100, 200, 0]));
        let mask = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let out = blend(&original, &mask, 0.4)?;
        // 100*0.6 + 255*0.4 = 162, 200*0.6 = 120
        assert_eq!(out.get_pixel(0, 0), &Rgb([162, 120, 0]));
        Ok(())
    }

    #[test]
    fn test_monotonic_in_alpha() -> Result<()> {
        let original = RgbImage::from_pixel(1, 1, Rgb([10, 240, 128]));
        let mask = RgbImage::from_pixel(1, 1, Rgb([250, 5, 128]));

        let mut previous = *original.get_pixel(0, 0);
        for step in 1..=10 {
            let current = *blend(&original, &mask, step as f32 / 10.0)?.get_pixel(0, 0);
            assert!(current[0] >= previous[0]);
            assert!(current[1] <= previous[1]);
            assert_eq!(current[2], 128);
            previous = current;
        }
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() {
        let original = gradient(4, 4);
        let mask = gradient(4, 3);
        assert!(matches!(
            blend(&original, &mask, 0.5),
            Err(PetSegError::DimensionMismatch {
                expected: (4, 4),
                actual: (4, 3)
            })
        ));
    }

    #[test]
    fn test_alpha_out_of_range() {
        let image = gradient(2, 2);
        assert!(blend(&image, &image, 1.5).is_err());
        assert!(blend(&image, &image, -0.1).is_err());
        assert!(blend(&image, &image, f32::NAN).is_err());
    }
}
