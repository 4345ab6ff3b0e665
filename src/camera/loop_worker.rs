use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::anomaly::{CameraId, Clip};
use crate::api::ApiClient;

use super::state::{select_latest_clip, CameraView};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const FETCH_INTERVAL_SECS: u64 = 10;

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(super) struct CameraClipChangedEvent {
    pub cam_id: CameraId,
    pub clip: Option<Clip>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct ClipDownloadedEvent {
    cam_id: CameraId,
    filename: String,
    path: String,
}

/// Refreshes one camera's local clip view every `FETCH_INTERVAL_SECS` and
/// auto-downloads each newly selected clip exactly once. A fetch error
/// counts as an empty result.
pub async fn clip_fetch_loop(
    cam_id: CameraId,
    view: Arc<Mutex<CameraView>>,
    api: ApiClient,
    app_handle: AppHandle,
    download_dir: PathBuf,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(FETCH_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let clips = match api.abnormal_clips().await {
                    Ok(clips) => clips,
                    Err(err) => {
                        log_warn!("clip fetch for {} failed: {err:#}", cam_id.as_str());
                        Vec::new()
                    }
                };

                let latest = select_latest_clip(clips, cam_id);

                let to_download = {
                    let mut view = view.lock().unwrap();

                    let changed = view.clip.as_ref().map(|c| c.filename.as_str())
                        != latest.as_ref().map(|c| c.filename.as_str());
                    view.clip = latest;

                    if changed {
                        let _ = app_handle.emit(
                            "camera-clip-changed",
                            CameraClipChangedEvent {
                                cam_id,
                                clip: view.clip.clone(),
                            },
                        );
                    }

                    match &view.clip {
                        Some(clip)
                            if !clip.url.is_empty()
                                && view.downloaded.as_deref() != Some(clip.filename.as_str()) =>
                        {
                            // Remembered before the download starts so a broken
                            // asset is not re-fetched every tick.
                            view.downloaded = Some(clip.filename.clone());
                            Some(clip.clone())
                        }
                        _ => None,
                    }
                };

                if let Some(clip) = to_download {
                    match api.download_clip(&clip.url, &download_dir, &clip.filename).await {
                        Ok(path) => {
                            log_info!("{} retrieved {}", cam_id.as_str(), clip.filename);
                            let _ = app_handle.emit(
                                "clip-downloaded",
                                ClipDownloadedEvent {
                                    cam_id,
                                    filename: clip.filename,
                                    path: path.display().to_string(),
                                },
                            );
                        }
                        Err(err) => {
                            log_error!("{} failed to retrieve {}: {err:#}", cam_id.as_str(), clip.filename);
                        }
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("clip fetch loop for {} shutting down", cam_id.as_str());
                break;
            }
        }
    }
}
