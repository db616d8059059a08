//! Raw-pixel capture sources.
//!
//! A source is whatever the platform hands back as a capturable surface.
//! There is usually one per monitor, but neither the count nor the
//! identifiers are guaranteed to line up with the display list.

use super::CaptureError;
use crate::geometry::Size;
use image::DynamicImage;
use serde::Serialize;

pub struct CaptureSource {
    pub id: String,
    /// Display the platform claims this source shows. May be missing,
    /// malformed, or shared by several sources.
    pub display_id_hint: Option<String>,
    pub pixels: DynamicImage,
}

impl CaptureSource {
    pub fn pixel_size(&self) -> Size {
        Size::new(self.pixels.width(), self.pixels.height())
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            id: self.id.clone(),
            display_id_hint: self.display_id_hint.clone(),
            pixel_size: self.pixel_size(),
        }
    }
}

impl std::fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSource")
            .field("id", &self.id)
            .field("display_id_hint", &self.display_id_hint)
            .field("pixel_size", &self.pixel_size())
            .finish()
    }
}

/// Pixel-free description of a source, for diagnostics and logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub id: String,
    pub display_id_hint: Option<String>,
    pub pixel_size: Size,
}

/// Grabs every available source. Called once per capture attempt; the
/// result is dropped as soon as the crop is extracted.
pub trait SourceEnumerator: Send + Sync {
    fn sources(&self) -> Result<Vec<CaptureSource>, CaptureError>;
}

#[cfg(test)]
pub(crate) fn test_source(id: &str, hint: Option<&str>, w: u32, h: u32) -> CaptureSource {
    CaptureSource {
        id: id.to_string(),
        display_id_hint: hint.map(str::to_string),
        pixels: DynamicImage::ImageRgba8(image::RgbaImage::new(w, h)),
    }
}
