//! Tauri command handlers and the shared application state behind them.
//!
//! Commands stringify errors at this boundary; the frontend only ever sees
//! a message.

use crate::capture::{
    CaptureDiagnostics, CaptureEngine, CaptureResult, DisplayEnumerator, TauriDisplays,
    XcapSources,
};
use crate::config::SettingsStore;
use crate::geometry::{Absolute, Point, Rect};
use crate::history::HistoryEntry;
use crate::overlay::{
    open_selection_overlay, OverlayWindow, RestoreOnExit, SelectionSession, SessionEvent,
};
use crate::recognition::{ApiCredentials, RecognitionClient, RecognitionResult};
use crate::temp_files::{CleanupReport, TempFileRegistry};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tauri::{AppHandle, Emitter, Manager, State};

pub const MAIN_WINDOW: &str = "main";

/// Lets the main window finish hiding before the overlay appears.
const HIDE_DELAY: Duration = Duration::from_millis(200);
/// Lets the overlay windows disappear before the screen is grabbed.
const TEARDOWN_DELAY: Duration = Duration::from_millis(150);

pub struct AppState {
    pub settings: SettingsStore,
    pub registry: Arc<TempFileRegistry>,
    pub engine: CaptureEngine<TauriDisplays, XcapSources>,
    pub recognizer: RecognitionClient,
    pub overlay: Mutex<Option<SelectionSession<OverlayWindow>>>,
}

/// Pointer and key events forwarded by `overlay.html`, in surface-local
/// logical pixels.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OverlayEvent {
    Down { x: i32, y: i32 },
    Move { x: i32, y: i32 },
    Up { x: i32, y: i32 },
    Escape,
}

/// Payload of the `capture-ready` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureReady {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub preview_png: String,
}

impl CaptureReady {
    fn from_result(result: &CaptureResult) -> std::io::Result<Self> {
        let bytes = std::fs::read(&result.file_path)?;
        Ok(Self {
            path: result.file_path.to_string_lossy().into_owned(),
            width: result.pixel_dimensions.width,
            height: result.pixel_dimensions.height,
            preview_png: STANDARD.encode(&bytes),
        })
    }
}

/// Hides the main window and opens the selection overlay on every display.
/// Does nothing if a selection is already in progress.
pub async fn begin_capture(app: &AppHandle) -> Result<(), String> {
    let state = app.state::<AppState>();
    if state.overlay.lock().map_err(|e| e.to_string())?.is_some() {
        log::info!("[OVERLAY] Selection already in progress");
        return Ok(());
    }

    if let Some(main) = app.get_webview_window(MAIN_WINDOW) {
        if let Err(e) = main.hide() {
            log::warn!("[OVERLAY] Failed to hide main window: {}", e);
        }
    }
    let restore = RestoreOnExit::new(|| show_main_window(app));
    tokio::time::sleep(HIDE_DELAY).await;

    let session = TauriDisplays(app.clone())
        .displays()
        .map_err(|e| e.to_string())
        .and_then(|displays| open_selection_overlay(app, displays).map_err(|e| e.to_string()))
        .map_err(|e| {
            log::error!("[OVERLAY] Failed to open selection overlay: {}", e);
            e
        })?;

    let mut guard = state.overlay.lock().map_err(|e| e.to_string())?;
    if guard.is_some() {
        // Lost a race with another trigger; its overlay is up, so the main
        // window stays hidden and this session closes on drop.
        restore.disarm();
        return Ok(());
    }
    *guard = Some(session);
    restore.disarm();
    Ok(())
}

#[tauri::command]
pub async fn start_capture(app: AppHandle) -> Result<(), String> {
    begin_capture(&app).await
}

/// Feeds one overlay event into the selection session.
///
/// The first commit or cancel on any surface ends the session and closes
/// every overlay window; a commit then captures in the background and
/// emits `capture-ready` (or `capture-failed`).
#[tauri::command]
pub fn overlay_event(
    app: AppHandle,
    state: State<'_, AppState>,
    surface: usize,
    event: OverlayEvent,
) -> Result<(), String> {
    let outcome = {
        let mut guard = state.overlay.lock().map_err(|e| e.to_string())?;
        let Some(session) = guard.as_mut() else {
            return Ok(());
        };
        let outcome = match event {
            OverlayEvent::Down { x, y } => session.pointer_down(surface, Point::new(x, y)),
            OverlayEvent::Move { x, y } => session.pointer_move(surface, Point::new(x, y)),
            OverlayEvent::Up { x, y } => session.pointer_up(surface, Point::new(x, y)),
            OverlayEvent::Escape => session.escape(),
        };
        if matches!(outcome, SessionEvent::Committed(_) | SessionEvent::Cancelled) {
            guard.take();
        }
        outcome
    };

    match outcome {
        SessionEvent::Committed(selection) => spawn_capture(app, selection),
        SessionEvent::Cancelled => show_main_window(&app),
        SessionEvent::Continue | SessionEvent::Ignored => {}
    }
    Ok(())
}

#[tauri::command]
pub fn close_overlay(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    let session = state.overlay.lock().map_err(|e| e.to_string())?.take();
    if let Some(session) = session {
        session.close();
        show_main_window(&app);
    }
    Ok(())
}

fn spawn_capture(app: AppHandle, selection: Rect<Absolute>) {
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(TEARDOWN_DELAY).await;

        let handle = app.clone();
        let captured = tauri::async_runtime::spawn_blocking(move || {
            handle.state::<AppState>().engine.capture(selection)
        })
        .await;

        let outcome = match captured {
            Ok(Ok(result)) => CaptureReady::from_result(&result).map_err(|e| e.to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Capture task failed: {}", e)),
        };

        show_main_window(&app);
        let emitted = match outcome {
            Ok(ready) => app.emit("capture-ready", ready),
            Err(message) => {
                log::error!("[CAPTURE] {}", message);
                app.emit("capture-failed", message)
            }
        };
        if let Err(e) = emitted {
            log::error!("[CAPTURE] Failed to notify frontend: {}", e);
        }
    });
}

pub fn show_main_window(app: &AppHandle) {
    if let Some(main) = app.get_webview_window(MAIN_WINDOW) {
        let _ = main.show();
        let _ = main.set_focus();
    }
}

/// Recognizes an image file. Explicit credentials win over stored ones.
/// Successful results are recorded in history.
#[tauri::command]
pub async fn recognize_image(
    app: AppHandle,
    state: State<'_, AppState>,
    image_path: String,
    credentials: Option<ApiCredentials>,
) -> Result<RecognitionResult, String> {
    let credentials = credentials
        .filter(ApiCredentials::is_complete)
        .unwrap_or_else(|| state.settings.credentials());

    let result = state
        .recognizer
        .recognize(Path::new(&image_path), &credentials)
        .await;

    if let RecognitionResult::Success { markup, .. } = &result {
        if let Err(e) = state.settings.record_history(markup) {
            log::warn!("[HISTORY] Failed to persist: {}", e);
        }
    }
    if let Err(e) = app.emit("recognition-complete", &result) {
        log::warn!("[OCR] Failed to emit result: {}", e);
    }
    Ok(result)
}

/// Stores bytes from a drop or paste as a registered temp file.
#[tauri::command]
pub fn save_temp_file(
    state: State<'_, AppState>,
    bytes: Vec<u8>,
    extension: Option<String>,
) -> Result<String, String> {
    if bytes.is_empty() {
        return Err("File is empty".to_string());
    }
    let extension = extension.unwrap_or_else(|| "png".to_string());
    let path = state
        .registry
        .write_file("upload", &extension, &bytes)
        .map_err(|e| e.to_string())?;
    Ok(path.to_string_lossy().into_owned())
}

#[tauri::command]
pub fn remove_temp_file(state: State<'_, AppState>, path: String) -> bool {
    state.registry.remove(Path::new(&path))
}

#[tauri::command]
pub fn cleanup_temp_files(state: State<'_, AppState>) -> CleanupReport {
    state.registry.cleanup_all()
}

#[tauri::command]
pub fn temp_files_count(state: State<'_, AppState>) -> usize {
    state.registry.count()
}

#[tauri::command]
pub async fn display_info(app: AppHandle) -> Result<CaptureDiagnostics, String> {
    tauri::async_runtime::spawn_blocking(move || app.state::<AppState>().engine.diagnose())
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_history(state: State<'_, AppState>) -> Vec<HistoryEntry> {
    state.settings.history()
}

#[tauri::command]
pub fn clear_history(state: State<'_, AppState>) -> Result<(), String> {
    state.settings.clear_history().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_api_config(state: State<'_, AppState>) -> ApiCredentials {
    state.settings.credentials()
}

#[tauri::command]
pub fn save_api_config(
    state: State<'_, AppState>,
    credentials: ApiCredentials,
) -> Result<(), String> {
    state
        .settings
        .update_credentials(credentials)
        .map_err(|e| e.to_string())
}
