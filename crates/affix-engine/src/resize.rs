//! Resizing decoded sources to their on-canvas size.
//!
//! Decodes are first reduced by an integer factor with a cheap area filter,
//! then scaled to the exact slot size with Lanczos3.

use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::geometry::Dimensions;

/// Fast box-filtered reduction used right after decoding.
pub fn subsample(img: &RgbaImage, size: Dimensions) -> RgbaImage {
    let size = Dimensions::new(size.width.max(1), size.height.max(1));
    debug!(
        orig_w = img.width(),
        orig_h = img.height(),
        new_width = size.width,
        new_height = size.height,
        "Subsampling decoded image"
    );
    imageops::thumbnail(img, size.width, size.height)
}

/// Scale an image to exactly `size`.
///
/// Returns the image unchanged if it already has that size.
pub fn fit_exact(img: RgbaImage, size: Dimensions) -> RgbaImage {
    let (orig_w, orig_h) = img.dimensions();

    if (orig_w, orig_h) == (size.width, size.height) {
        debug!(orig_w, orig_h, "Image already at slot size, skipping resize");
        return img;
    }

    let width = size.width.max(1);
    let height = size.height.max(1);
    debug!(
        orig_w,
        orig_h,
        new_width = width,
        new_height = height,
        "Resizing image to slot"
    );

    imageops::resize(&img, width, height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn create_test_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([128, 64, 32, 255]))
    }

    #[test]
    fn test_fit_exact_downscale() {
        let result = fit_exact(create_test_image(800, 600), Dimensions::new(400, 300));
        assert_eq!(result.dimensions(), (400, 300));
    }

    #[test]
    fn test_fit_exact_upscale() {
        let result = fit_exact(create_test_image(200, 100), Dimensions::new(400, 200));
        assert_eq!(result.dimensions(), (400, 200));
    }

    #[test]
    fn test_fit_exact_same_size_is_untouched() {
        let mut img = create_test_image(30, 20);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        let result = fit_exact(img, Dimensions::new(30, 20));
        assert_eq!(result.get_pixel(0, 0).0, [1, 2, 3, 4]);
    }

    #[test]
    fn test_fit_exact_preserves_non_zero_dimensions() {
        let result = fit_exact(create_test_image(1000, 1), Dimensions::new(10, 0));
        assert_eq!(result.width(), 10);
        assert!(result.height() >= 1, "Height should be at least 1");
    }

    #[test]
    fn test_subsample_keeps_uniform_color() {
        let result = subsample(&create_test_image(64, 64), Dimensions::new(16, 16));
        assert_eq!(result.dimensions(), (16, 16));
        assert_eq!(result.get_pixel(8, 8).0, [128, 64, 32, 255]);
    }
}
