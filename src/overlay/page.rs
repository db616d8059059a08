//! Per-surface configuration injected into the overlay page.
//!
//! `ui/overlay.html` is shared by every surface. Before it loads, each
//! window gets a script defining `window.__SNIPTEX_OVERLAY__` with the
//! surface index and the display it covers; the page echoes the index back
//! with every pointer event.

use super::MIN_SELECTION_PX;
use crate::capture::Display;

pub fn init_script(surface: usize, display: &Display) -> String {
    let config = serde_json::json!({
        "surface": surface,
        "displayNumber": surface + 1,
        "displayId": display.id,
        "bounds": {
            "x": display.bounds.x,
            "y": display.bounds.y,
            "width": display.bounds.width,
            "height": display.bounds.height,
        },
        "minSelection": MIN_SELECTION_PX,
    });
    format!("window.__SNIPTEX_OVERLAY__ = Object.freeze({});", config)
}
