use std::path::PathBuf;

use tauri::State;

use crate::anomaly::CameraId;
use crate::camera::CameraView;
use crate::AppState;

#[tauri::command]
pub async fn get_camera_view(
    state: State<'_, AppState>,
    cam_id: CameraId,
) -> Result<CameraView, String> {
    Ok(state.cameras.get(cam_id).view_snapshot())
}

#[tauri::command]
pub async fn upload_video(
    state: State<'_, AppState>,
    cam_id: CameraId,
    path: PathBuf,
) -> Result<(), String> {
    state
        .cameras
        .get(cam_id)
        .upload_video(path)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn reset_camera(state: State<'_, AppState>, cam_id: CameraId) -> Result<(), String> {
    state
        .cameras
        .get(cam_id)
        .reset()
        .await
        .map_err(|e| e.to_string())
}
