//! Platform enumerators: displays from Tauri's monitor API, pixels from
//! the `xcap` crate.
//!
//! This is the infrastructure layer; it talks to the OS. Both calls block,
//! so run them off the async runtime (`spawn_blocking`).

use super::display::{layout_displays, Display, DisplayEnumerator, PlatformMonitor};
use super::source::{CaptureSource, SourceEnumerator};
use super::CaptureError;
use crate::geometry::Rect;
use image::DynamicImage;
use tauri::AppHandle;
use xcap::Monitor;

/// Display layout from the windowing system. Positions come in physical
/// desktop pixels and are laid out into one logical space by
/// [`layout_displays`].
pub struct TauriDisplays(pub AppHandle);

impl DisplayEnumerator for TauriDisplays {
    fn displays(&self) -> Result<Vec<Display>, CaptureError> {
        let monitors = self
            .0
            .available_monitors()
            .map_err(|e| CaptureError::DisplayEnumeration(e.to_string()))?;
        let primary = self
            .0
            .primary_monitor()
            .map_err(|e| CaptureError::DisplayEnumeration(e.to_string()))?;
        // Names can repeat across identical monitors; position cannot.
        let primary_position = primary.as_ref().map(|m| *m.position());

        let platform: Vec<PlatformMonitor> = monitors
            .iter()
            .map(|m| {
                let position = m.position();
                let size = m.size();
                PlatformMonitor {
                    name: m.name().cloned(),
                    bounds: Rect::new(position.x, position.y, size.width, size.height),
                    scale_factor: m.scale_factor(),
                    primary: primary_position == Some(*position),
                }
            })
            .collect();

        let displays = layout_displays(&platform);
        if displays.is_empty() {
            return Err(CaptureError::NoDisplays);
        }
        for d in &displays {
            log::debug!(
                "[CAPTURE] Display {} at ({},{}) {}x{} scale {}{}",
                d.id,
                d.bounds.x,
                d.bounds.y,
                d.bounds.width,
                d.bounds.height,
                d.scale_factor,
                if d.primary { " (primary)" } else { "" }
            );
        }
        Ok(displays)
    }
}

/// One full-resolution screenshot per monitor, via xcap.
pub struct XcapSources;

impl SourceEnumerator for XcapSources {
    fn sources(&self) -> Result<Vec<CaptureSource>, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::SourceEnumeration(e.to_string()))?;

        let mut sources = Vec::with_capacity(monitors.len());
        for (index, monitor) in monitors.into_iter().enumerate() {
            let name = monitor.name().ok();
            let id = match monitor.id() {
                Ok(id) => format!("screen:{}", id),
                Err(_) => format!("screen:{}", index),
            };
            match monitor.capture_image() {
                Ok(image) => sources.push(CaptureSource {
                    id,
                    display_id_hint: name,
                    pixels: DynamicImage::ImageRgba8(image),
                }),
                Err(e) => log::warn!("[CAPTURE] Skipping source {}: {}", id, e),
            }
        }

        if sources.is_empty() {
            return Err(CaptureError::NoCaptureSourcesAvailable);
        }
        Ok(sources)
    }
}
