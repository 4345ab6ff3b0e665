use tauri::State;

use crate::anomaly::{CameraId, Clip, DashboardState};
use crate::AppState;

#[tauri::command]
pub async fn get_anomaly_snapshot(state: State<'_, AppState>) -> Result<DashboardState, String> {
    Ok(state.anomalies.snapshot().await)
}

#[tauri::command]
pub async fn set_anomaly(
    state: State<'_, AppState>,
    cam_id: CameraId,
    clip: Option<Clip>,
) -> Result<(), String> {
    state
        .anomalies
        .set_anomaly(cam_id, clip)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn reset_anomaly(state: State<'_, AppState>, cam_id: CameraId) -> Result<(), String> {
    state
        .anomalies
        .reset_anomaly(cam_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn clear_all_anomalies(state: State<'_, AppState>) -> Result<(), String> {
    state.anomalies.clear_all().await.map_err(|e| e.to_string())
}
