pub mod attendance;
pub mod config;
pub mod error;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use tauri::{Emitter, Manager};

    use crate::attendance::commands::{self, Workflow};
    use crate::attendance::{AttendanceWorkflow, Backend};
    use crate::config::Config;

    const CONFIG_FILE: &str = "attendance.json";
    const EVENT_CHANNEL: &str = "workflow://event";

    /// Load `attendance.json` from the app config dir, falling back to defaults
    fn load_config(app: &tauri::App) -> Config {
        let path = match app.path().app_config_dir() {
            Ok(dir) => dir.join(CONFIG_FILE),
            Err(e) => {
                log::warn!("[attendance] Cannot resolve config dir, using defaults: {}", e);
                return Config::default();
            }
        };

        match tauri::async_runtime::block_on(Config::load_or_default(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("[attendance] Ignoring {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        tauri::Builder::default()
            .plugin(tauri_plugin_dialog::init())
            .invoke_handler(tauri::generate_handler![
                commands::get_workflow_state,
                commands::scan_for_devices,
                commands::cancel_scan,
                commands::select_device,
                commands::fetch_attendance,
                commands::sync_device,
                commands::export_attendance_csv,
                commands::get_app_version,
            ])
            .setup(|app| {
                // Enable logging in both debug and release builds
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(if cfg!(debug_assertions) {
                            log::LevelFilter::Debug
                        } else {
                            log::LevelFilter::Info
                        })
                        .build(),
                )?;

                let config = load_config(app);
                let workflow: Workflow =
                    Arc::new(AttendanceWorkflow::new(Backend::from_config(&config), &config));

                let mut events = workflow.subscribe();
                let handle = app.handle().clone();
                tauri::async_runtime::spawn(async move {
                    use tokio::sync::broadcast::error::RecvError;
                    loop {
                        match events.recv().await {
                            Ok(event) => {
                                if let Err(e) = handle.emit(EVENT_CHANNEL, &event) {
                                    log::warn!("[attendance] Failed to emit event: {}", e);
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                log::warn!("[attendance] Event forwarder skipped {} event(s)", skipped);
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                });

                app.manage(workflow);
                Ok(())
            })
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
