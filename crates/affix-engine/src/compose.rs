//! Composition: stream every source onto one canvas, one image at a time.

use std::ops::ControlFlow;

use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::PixelBuffer;
use crate::color::Color;
use crate::error::CompositeError;
use crate::geometry::{Dimensions, RenderScale, Spacing};
use crate::layout::{self, CanvasPlan};
use crate::resize;
use crate::source::ImageSource;

/// Reported after each image lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawProgress {
    pub index: usize,
    pub drawn: usize,
    pub total: usize,
}

/// Composite `images` in order onto a fresh canvas.
///
/// All or nothing: the first source that fails to decode aborts the whole
/// composite and the partially drawn canvas is dropped.
pub fn composite(
    plan: &CanvasPlan,
    scale: RenderScale,
    images: &mut [ImageSource],
    spacing: Spacing,
    background: Option<Color>,
) -> Result<PixelBuffer, CompositeError> {
    composite_with(plan, scale, images, spacing, background, |_| {
        ControlFlow::Continue(())
    })
}

/// Like [`composite`], calling `on_drawn` after each image.
///
/// Returning [`ControlFlow::Break`] stops before the next image is decoded
/// and yields [`CompositeError::Cancelled`].
pub fn composite_with<F>(
    plan: &CanvasPlan,
    scale: RenderScale,
    images: &mut [ImageSource],
    spacing: Spacing,
    background: Option<Color>,
    mut on_drawn: F,
) -> Result<PixelBuffer, CompositeError>
where
    F: FnMut(DrawProgress) -> ControlFlow<()>,
{
    if images.is_empty() {
        return Err(CompositeError::NothingDrawn);
    }

    let mut sizes = Vec::with_capacity(images.len());
    for (index, source) in images.iter_mut().enumerate() {
        let size = source
            .dimensions()
            .map_err(|cause| CompositeError::ImageFailed { index, cause })?;
        sizes.push(size);
    }

    let arrangement = layout::arrange(&sizes, plan, scale, spacing)?;
    let mut canvas = allocate_canvas(arrangement.canvas, background)?;
    info!(
        canvas = %arrangement.canvas,
        images = images.len(),
        scale = scale.get(),
        "Compositing"
    );

    let total = images.len();
    let mut drawn = 0usize;
    for (index, (source, slot)) in images.iter().zip(&arrangement.slots).enumerate() {
        let decoded = source.decode(slot.size).map_err(|cause| {
            warn!(index, image = %source.image(), error = %cause, "Aborting composite");
            CompositeError::ImageFailed { index, cause }
        })?;
        let fitted = resize::fit_exact(decoded, slot.size);
        overlay(&mut canvas, &fitted, slot.x, slot.y);
        drop(fitted);

        drawn += 1;
        debug!(index, x = slot.x, y = slot.y, size = %slot.size, "Drew image");
        if on_drawn(DrawProgress { index, drawn, total }).is_break() && drawn < total {
            info!(drawn, total, "Composite stopped on request");
            return Err(CompositeError::Cancelled);
        }
    }

    if drawn == 0 {
        return Err(CompositeError::NothingDrawn);
    }
    Ok(canvas)
}

/// Allocate the canvas, filled with `background` or fully transparent.
fn allocate_canvas(
    size: Dimensions,
    background: Option<Color>,
) -> Result<RgbaImage, CompositeError> {
    let failed = || CompositeError::BufferAllocationFailed {
        width: size.width,
        height: size.height,
    };

    let len = usize::try_from(size.pixel_count())
        .ok()
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(failed)?;

    let mut raw: Vec<u8> = Vec::new();
    raw.try_reserve_exact(len).map_err(|_| {
        warn!(%size, bytes = len, "Canvas allocation failed");
        failed()
    })?;

    match background.filter(|c| !c.is_transparent()) {
        Some(color) => {
            let rgba = color.to_rgba().0;
            raw.extend(std::iter::repeat_n(rgba, len / 4).flatten());
        }
        None => raw.resize(len, 0),
    }

    RgbaImage::from_raw(size.width, size.height, raw).ok_or_else(failed)
}

/// Source-over composite `top` onto `base` at the given position.
///
/// Pixels falling outside `base` are clipped.
pub fn overlay(base: &mut RgbaImage, top: &RgbaImage, x: u32, y: u32) {
    for (dx, dy, pixel) in top.enumerate_pixels() {
        let (Some(target_x), Some(target_y)) = (x.checked_add(dx), y.checked_add(dy)) else {
            continue;
        };
        if target_x < base.width() && target_y < base.height() {
            let alpha = pixel[3];
            if alpha == 255 {
                base.put_pixel(target_x, target_y, *pixel);
            } else if alpha > 0 {
                let bg = base.get_pixel(target_x, target_y);
                let blended = blend_pixel(bg, pixel);
                base.put_pixel(target_x, target_y, blended);
            }
        }
    }
}

fn blend_pixel(bg: &Rgba<u8>, fg: &Rgba<u8>) -> Rgba<u8> {
    let fa = f32::from(fg[3]) / 255.0;
    let ba = f32::from(bg[3]) / 255.0;
    let out_a = fa + ba * (1.0 - fa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |i: usize| {
        let c = (f32::from(fg[i]) * fa + f32::from(bg[i]) * ba * (1.0 - fa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
