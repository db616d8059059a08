//! sniptex: snip a screen region on any monitor and recognize the formula
//! in it as LaTeX.
//!
//! The pipeline core (geometry, capture, overlay session, recognition,
//! temp files, history, config) has no windowing dependency. The Tauri
//! shell that wires it to real windows lives behind the `desktop` feature:
//! - System tray (tray.rs)
//! - Command handlers for frontend communication (commands.rs)
//! - Global capture shortcut

pub mod capture;
pub mod config;
pub mod geometry;
pub mod history;
pub mod overlay;
pub mod recognition;
pub mod temp_files;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod tray;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::capture::{CaptureEngine, TauriDisplays, XcapSources};
    use crate::commands::{self, AppState};
    use crate::config::{self, SettingsStore};
    use crate::recognition::RecognitionClient;
    use crate::temp_files::TempFileRegistry;
    use crate::tray;
    use std::sync::{Arc, Mutex};
    use tauri::{Manager, RunEvent};
    use tauri_plugin_global_shortcut::{Code, GlobalShortcutExt, Modifiers, Shortcut, ShortcutState};

    /// Entry point, called from `main.rs`.
    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        env_logger::init();
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("[CONFIG] No .env loaded: {}", e);
        }

        let app = tauri::Builder::default()
            .plugin(
                tauri_plugin_global_shortcut::Builder::new()
                    .with_handler(|app, _shortcut, event| {
                        if event.state == ShortcutState::Pressed {
                            let app = app.clone();
                            tauri::async_runtime::spawn(async move {
                                if let Err(e) = commands::begin_capture(&app).await {
                                    log::error!("Failed to start capture: {}", e);
                                }
                            });
                        }
                    })
                    .build(),
            )
            .invoke_handler(tauri::generate_handler![
                commands::start_capture,
                commands::overlay_event,
                commands::close_overlay,
                commands::recognize_image,
                commands::save_temp_file,
                commands::remove_temp_file,
                commands::cleanup_temp_files,
                commands::temp_files_count,
                commands::display_info,
                commands::get_history,
                commands::clear_history,
                commands::get_api_config,
                commands::save_api_config,
            ])
            .setup(|app| {
                log::info!("sniptex starting up");

                let settings = SettingsStore::open(config::settings_path()?)?;
                let registry = Arc::new(TempFileRegistry::create(std::env::temp_dir())?);
                let startup = registry.cleanup_all();
                log::info!(
                    "[TEMP] Startup cleanup: removed {}, failed {}",
                    startup.removed,
                    startup.failed
                );

                let recognizer =
                    RecognitionClient::http()?.with_fallback_config(settings.path());
                let engine = CaptureEngine::new(
                    TauriDisplays(app.handle().clone()),
                    XcapSources,
                    Arc::clone(&registry),
                );

                tauri::async_runtime::spawn(
                    Arc::clone(&registry).run_sweeper(settings.sweep_interval()),
                );

                let shortcut = parse_shortcut(&settings.capture_shortcut());
                app.global_shortcut().register(shortcut)?;

                app.manage(AppState {
                    settings,
                    registry,
                    engine,
                    recognizer,
                    overlay: Mutex::new(None),
                });

                tray::setup_tray(app.handle())?;

                log::info!("System tray initialized, ready to capture");
                Ok(())
            })
            .build(tauri::generate_context!())
            .expect("Error building sniptex");

        app.run(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<AppState>() {
                    state.registry.cleanup_all();
                }
                log::info!("sniptex shut down");
            }
        });
    }

    fn parse_shortcut(configured: &str) -> Shortcut {
        configured.parse().unwrap_or_else(|e| {
            log::warn!(
                "[CONFIG] Invalid capture shortcut {:?} ({}), using Alt+C",
                configured,
                e
            );
            Shortcut::new(Some(Modifiers::ALT), Code::KeyC)
        })
    }
}
