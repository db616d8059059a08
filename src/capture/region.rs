//! Pure region cropping logic: the functional core.
//!
//! This module has zero infrastructure dependencies.
//! It maps a virtual-screen selection into a source's pixel space and
//! extracts those pixels as PNG.

use super::display::{virtual_screen, Display};
use super::source::CaptureSource;
use crate::geometry::{self, Absolute, Local, Rect, Size, SourcePx};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// How the selection was projected into source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Only one display: scale the absolute rect by source / display.
    SingleDisplay,
    /// Source belongs to the target display: go display-relative, then scale.
    DisplayRelative,
    /// Source covers several displays: offset by the virtual screen origin,
    /// scale by source / virtual screen.
    VirtualScreen,
}

/// Computes the (unclamped) crop rectangle in `source`'s pixel space.
pub fn project_selection(
    selection: Rect<Absolute>,
    target: &Display,
    source: &CaptureSource,
    displays: &[Display],
) -> (Rect<SourcePx>, Projection) {
    let pixels = source.pixel_size();

    if displays.len() <= 1 {
        let (sx, sy) = ratio(pixels, target.bounds.size());
        return (geometry::scale_rect(selection, sx, sy), Projection::SingleDisplay);
    }

    let extent = virtual_screen(displays).unwrap_or(target.bounds);
    let same_display = source.display_id_hint.as_deref() == Some(target.id.as_str());

    if same_display || !spans_displays(pixels, target.bounds.size(), extent.size()) {
        let relative: Rect<Local> =
            geometry::translate(selection, -target.bounds.x, -target.bounds.y);
        let (sx, sy) = ratio(pixels, target.bounds.size());
        return (geometry::scale_rect(relative, sx, sy), Projection::DisplayRelative);
    }

    let relative: Rect<Absolute> = geometry::translate(selection, -extent.x, -extent.y);
    let (sx, sy) = ratio(pixels, extent.size());
    (geometry::scale_rect(relative, sx, sy), Projection::VirtualScreen)
}

/// Projects and clamps `selection` into `source`'s pixel bounds.
pub fn source_crop_rect(
    selection: Rect<Absolute>,
    target: &Display,
    source: &CaptureSource,
    displays: &[Display],
) -> Rect<SourcePx> {
    let (raw, projection) = project_selection(selection, target, source, displays);
    let clamped = geometry::clamp_rect(raw, source.pixel_size());
    log::debug!(
        "[CAPTURE] {:?} projection: raw {:?} -> clamped {:?}",
        projection,
        (raw.x, raw.y, raw.width, raw.height),
        (clamped.x, clamped.y, clamped.width, clamped.height)
    );
    clamped
}

/// True when the source's shape is closer to the whole virtual screen than
/// to the target display. Ties go to the display.
fn spans_displays(pixels: Size, display: Size, extent: Size) -> bool {
    let (Some(src), Some(one), Some(all)) = (aspect(pixels), aspect(display), aspect(extent)) else {
        return false;
    };
    (src - all).abs() < (src - one).abs()
}

fn aspect(size: Size) -> Option<f64> {
    if size.is_empty() {
        None
    } else {
        Some(size.width as f64 / size.height as f64)
    }
}

fn ratio(pixels: Size, logical: Size) -> (f64, f64) {
    let sx = if logical.width == 0 {
        1.0
    } else {
        pixels.width as f64 / logical.width as f64
    };
    let sy = if logical.height == 0 {
        1.0
    } else {
        pixels.height as f64 / logical.height as f64
    };
    (sx, sy)
}

/// Crops a `DynamicImage` to the given source-space rectangle and returns
/// PNG bytes.
///
/// This is a pure function with no side effects.
pub fn crop_to_png_bytes(image: &DynamicImage, crop: Rect<SourcePx>) -> Result<Vec<u8>, CropError> {
    if crop.is_empty() || image.width() == 0 || image.height() == 0 {
        return Err(CropError::ZeroDimension);
    }

    let (img_width, img_height) = (image.width(), image.height());

    if crop.x < 0
        || crop.y < 0
        || crop.right() > img_width as i64
        || crop.bottom() > img_height as i64
    {
        return Err(CropError::OutOfBounds {
            requested: (crop.x, crop.y, crop.width, crop.height),
            image_size: (img_width, img_height),
        });
    }

    let cropped = image.crop_imm(crop.x as u32, crop.y as u32, crop.width, crop.height);
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(CropError::ZeroDimension);
    }

    let mut png_bytes: Vec<u8> = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle or source image has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({},{},{},{}) exceeds image bounds ({}x{})",
        requested.0, requested.1, requested.2, requested.3,
        image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: (i32, i32, u32, u32),
        image_size: (u32, u32),
    },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}
