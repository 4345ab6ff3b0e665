mod anomaly;
mod api;
mod camera;
mod polling;
mod settings;
mod utils;

use std::sync::Arc;

use anomaly::commands::{clear_all_anomalies, get_anomaly_snapshot, reset_anomaly, set_anomaly};
use anomaly::AnomalyController;
use api::ApiClient;
use camera::commands::{get_camera_view, reset_camera, upload_video};
use camera::CameraSupervisor;
use polling::PollController;
use settings::{ServerSettings, SettingsStore};
use tauri::{Emitter, Manager, State};
use tokio::sync::Mutex;

pub(crate) struct AppState {
    pub(crate) anomalies: AnomalyController,
    pub(crate) cameras: CameraSupervisor,
    pub(crate) poller: Mutex<PollController>,
    pub(crate) api: ApiClient,
    pub(crate) settings: Arc<SettingsStore>,
}

#[tauri::command]
fn get_server_settings(state: State<AppState>) -> Result<ServerSettings, String> {
    Ok(state.settings.server())
}

#[tauri::command]
async fn set_server_settings(
    settings: ServerSettings,
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
) -> Result<(), String> {
    let previous = state.settings.server();
    state
        .settings
        .update_server(settings.clone())
        .map_err(|e| e.to_string())?;

    // Bounce the loops when the address changed so the first fetch against
    // the new server fires immediately instead of waiting out an interval.
    if previous.base_url != settings.base_url {
        let mut poller = state.poller.lock().await;
        poller.stop().await.map_err(|e| e.to_string())?;
        poller
            .start(state.api.clone(), state.anomalies.clone())
            .map_err(|e| e.to_string())?;
        state.cameras.restart_all().await.map_err(|e| e.to_string())?;
    }

    app_handle
        .emit("server-settings-updated", &settings)
        .map_err(|e| e.to_string())?;

    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("CamWatch starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_path = app_data_dir.join("settings.json");
                let settings = Arc::new(SettingsStore::new(settings_path)?);

                let download_dir = settings
                    .server()
                    .download_dir
                    .unwrap_or_else(|| app_data_dir.join("clips"));
                std::fs::create_dir_all(&download_dir)?;

                let api = ApiClient::new(Arc::clone(&settings));
                let anomalies = AnomalyController::new(app.handle().clone());

                let cameras = CameraSupervisor::new(
                    api.clone(),
                    anomalies.clone(),
                    app.handle().clone(),
                    download_dir,
                );

                let mut poller = PollController::new();
                tauri::async_runtime::block_on(async {
                    poller.start(api.clone(), anomalies.clone())?;
                    cameras.start_all().await
                })?;

                app.manage(AppState {
                    anomalies,
                    cameras,
                    poller: Mutex::new(poller),
                    api,
                    settings,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_anomaly_snapshot,
            set_anomaly,
            reset_anomaly,
            clear_all_anomalies,
            get_camera_view,
            upload_video,
            reset_camera,
            get_server_settings,
            set_server_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
