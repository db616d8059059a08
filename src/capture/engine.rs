//! Capture orchestration: selection in, PNG file out.

use super::display::{owning_display, Display, DisplayEnumerator};
use super::region::{crop_to_png_bytes, source_crop_rect, CropError};
use super::resolver::{Resolution, ResolveContext, SourceResolver};
use super::source::{SourceEnumerator, SourceInfo};
use super::CaptureError;
use crate::geometry::{Absolute, Rect, Size};
use crate::temp_files::TempFileRegistry;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// A capture written to disk. Owned by the temp-file registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub file_path: PathBuf,
    pub pixel_dimensions: Size,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayDiagnostics {
    pub index: usize,
    pub display: Display,
    pub resolution: Option<Resolution>,
}

/// What the resolver would do for every display right now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDiagnostics {
    pub displays: Vec<DisplayDiagnostics>,
    pub sources: Vec<SourceInfo>,
    pub virtual_screen: Option<Rect<Absolute>>,
}

pub struct CaptureEngine<D, S> {
    displays: D,
    sources: S,
    resolver: SourceResolver,
    registry: Arc<TempFileRegistry>,
}

impl<D: DisplayEnumerator, S: SourceEnumerator> CaptureEngine<D, S> {
    pub fn new(displays: D, sources: S, registry: Arc<TempFileRegistry>) -> Self {
        Self::with_resolver(displays, sources, SourceResolver::default(), registry)
    }

    pub fn with_resolver(
        displays: D,
        sources: S,
        resolver: SourceResolver,
        registry: Arc<TempFileRegistry>,
    ) -> Self {
        Self {
            displays,
            sources,
            resolver,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<TempFileRegistry> {
        &self.registry
    }

    /// Captures `selection` (virtual-screen coordinates) into a PNG file.
    ///
    /// Displays and sources are enumerated fresh on every call.
    pub fn capture(&self, selection: Rect<Absolute>) -> Result<CaptureResult, CaptureError> {
        let start = Instant::now();

        if selection.is_empty() {
            return Err(CaptureError::EmptyCapture);
        }

        let displays = self.displays.displays()?;
        let (target_index, target) =
            owning_display(&displays, &selection).ok_or(CaptureError::NoDisplays)?;

        log::info!(
            "[CAPTURE] Selection ({},{} {}x{}) on display {} (#{}, scale {})",
            selection.x,
            selection.y,
            selection.width,
            selection.height,
            target.id,
            target_index,
            target.scale_factor
        );

        let sources = self.sources.sources()?;
        let enumerate_ms = start.elapsed().as_millis();
        log::info!(
            "[CAPTURE] {} displays, {} sources enumerated in {}ms",
            displays.len(),
            sources.len(),
            enumerate_ms
        );

        let resolution = self.resolver.resolve(&ResolveContext {
            target,
            target_index,
            displays: &displays,
            sources: &sources,
            center: selection.center(),
        })?;
        let source = &sources[resolution.source_index];

        let crop = source_crop_rect(selection, target, source, &displays);
        let png = crop_to_png_bytes(&source.pixels, crop).map_err(|e| match e {
            CropError::ZeroDimension => CaptureError::EmptyCapture,
            other => CaptureError::Crop(other),
        })?;

        let crop_ms = start.elapsed().as_millis() - enumerate_ms;
        log::info!(
            "[CAPTURE] Cropped {}x{} at {},{} from {} in {}ms ({} bytes)",
            crop.width,
            crop.height,
            crop.x,
            crop.y,
            source.id,
            crop_ms,
            png.len()
        );

        let file_path = self.registry.write_file("capture", "png", &png)?;

        log::info!(
            "[CAPTURE] Saved {} in {}ms total",
            file_path.display(),
            start.elapsed().as_millis()
        );

        Ok(CaptureResult {
            file_path,
            pixel_dimensions: crop.size(),
        })
    }

    pub fn diagnose(&self) -> Result<CaptureDiagnostics, CaptureError> {
        let displays = self.displays.displays()?;
        let sources = self.sources.sources()?;

        let per_display = displays
            .iter()
            .enumerate()
            .map(|(index, display)| {
                let resolution = self
                    .resolver
                    .resolve(&ResolveContext {
                        target: display,
                        target_index: index,
                        displays: &displays,
                        sources: &sources,
                        center: display.bounds.center(),
                    })
                    .ok();
                DisplayDiagnostics {
                    index,
                    display: display.clone(),
                    resolution,
                }
            })
            .collect();

        Ok(CaptureDiagnostics {
            displays: per_display,
            sources: sources.iter().map(|s| s.info()).collect(),
            virtual_screen: super::display::virtual_screen(&displays),
        })
    }
}
