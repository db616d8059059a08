//! Tauri overlay windows: one borderless, transparent, always-on-top
//! window per display, each loading `overlay.html`.

use super::{init_script, SelectionSession, SurfaceHandle};
use crate::capture::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use tauri::{AppHandle, PhysicalPosition, PhysicalSize, WebviewUrl, WebviewWindow, WebviewWindowBuilder};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct OverlayWindow(WebviewWindow);

impl OverlayWindow {
    pub fn label(&self) -> &str {
        self.0.label()
    }
}

impl SurfaceHandle for OverlayWindow {
    fn close(self) {
        if let Err(e) = self.0.destroy() {
            log::warn!("[OVERLAY] Failed to close {}: {}", self.0.label(), e);
        }
    }
}

/// Opens a selection session covering every display in `displays`.
///
/// Labels carry a per-session counter so a new session never collides with
/// windows of the previous one that are still being torn down.
pub fn open_selection_overlay(
    app: &AppHandle,
    displays: Vec<Display>,
) -> tauri::Result<SelectionSession<OverlayWindow>> {
    let session_id = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    let start = std::time::Instant::now();

    let session = SelectionSession::open(displays, |index, display| {
        let label = format!("overlay-{}-{}", session_id, index);
        let b = display.bounds;
        let window =
            WebviewWindowBuilder::new(app, &label, WebviewUrl::App("overlay.html".into()))
                .title("sniptex selection")
                .position(b.x as f64, b.y as f64)
                .inner_size(b.width as f64, b.height as f64)
                .decorations(false)
                .transparent(true)
                .always_on_top(true)
                .skip_taskbar(true)
                .resizable(false)
                .shadow(false)
                .visible(false)
                .initialization_script(&init_script(index, display))
                .build()?;
        let overlay = OverlayWindow(window);
        if let Err(e) = place(&overlay.0, display) {
            overlay.close();
            return Err(e);
        }
        log::debug!(
            "[OVERLAY] {} covers {} at ({},{}) {}x{}",
            label,
            display.id,
            b.x,
            b.y,
            b.width,
            b.height
        );
        Ok::<_, tauri::Error>(overlay)
    })?;

    log::info!(
        "[OVERLAY] {} windows opened in {}ms",
        session.surface_count(),
        start.elapsed().as_millis()
    );
    Ok(session)
}

/// Moves the hidden window onto its display and shows it. The logical
/// builder position is converted with a single scale factor, which
/// misplaces windows on mixed-DPI setups, so physical bounds win when known.
fn place(window: &WebviewWindow, display: &Display) -> tauri::Result<()> {
    if let Some(p) = display.physical {
        window.set_position(PhysicalPosition::new(p.x, p.y))?;
        window.set_size(PhysicalSize::new(p.width, p.height))?;
    }
    window.show()?;
    if display.primary {
        window.set_focus()?;
    }
    Ok(())
}
