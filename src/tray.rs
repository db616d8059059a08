//! System tray icon and menu.
//!
//! Left-click starts a region capture; the menu offers capture, temp-file
//! cleanup and quit.

use crate::commands::{self, AppState};
use tauri::{
    image::Image as TauriImage,
    menu::{MenuBuilder, MenuItemBuilder},
    tray::{MouseButton, TrayIconBuilder, TrayIconEvent},
    AppHandle, Manager,
};

const MENU_CAPTURE: &str = "capture";
const MENU_CLEANUP: &str = "cleanup";
const MENU_QUIT: &str = "quit";

pub fn setup_tray(app: &AppHandle) -> Result<(), Box<dyn std::error::Error>> {
    let capture_item = MenuItemBuilder::with_id(MENU_CAPTURE, "Capture region").build(app)?;
    let cleanup_item =
        MenuItemBuilder::with_id(MENU_CLEANUP, "Clean up temporary files").build(app)?;
    let quit_item = MenuItemBuilder::with_id(MENU_QUIT, "Quit").build(app)?;
    let menu = MenuBuilder::new(app)
        .item(&capture_item)
        .item(&cleanup_item)
        .separator()
        .item(&quit_item)
        .build()?;

    // Decode the PNG icon to RGBA for Tauri's Image type
    let icon_bytes = include_bytes!("../icons/32x32.png");
    let icon_img = image::load_from_memory(icon_bytes)
        .map_err(|e| format!("Failed to decode tray icon: {}", e))?;
    let rgba = icon_img.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let tray_icon = TauriImage::new_owned(rgba.into_raw(), w, h);

    let _tray = TrayIconBuilder::new()
        .icon(tray_icon)
        .tooltip("sniptex: click to capture a formula")
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_tray_icon_event(|tray_icon, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                ..
            } = event
            {
                log::info!("Tray icon clicked, starting capture");
                spawn_capture(tray_icon.app_handle());
            }
        })
        .on_menu_event(|app, event| match event.id().as_ref() {
            MENU_CAPTURE => spawn_capture(app),
            MENU_CLEANUP => {
                let report = app.state::<AppState>().registry.cleanup_all();
                log::info!(
                    "[TEMP] Tray cleanup: removed {}, failed {}",
                    report.removed,
                    report.failed
                );
            }
            MENU_QUIT => {
                log::info!("Quit requested from tray menu");
                app.exit(0);
            }
            _ => {}
        })
        .build(app)?;

    Ok(())
}

fn spawn_capture(app: &AppHandle) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(e) = commands::begin_capture(&app).await {
            log::error!("Failed to start capture: {}", e);
        }
    });
}
