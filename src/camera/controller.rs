use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{anyhow, bail, Context, Result};
use log::error;
use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::anomaly::{AnomalyController, CameraId, Clip};
use crate::api::{AnalyzeResponse, ApiClient};

use super::loop_worker::{clip_fetch_loop, CameraClipChangedEvent};
use super::state::CameraView;

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct UploadProgressEvent {
    cam_id: CameraId,
    percent: u8,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct UploadFinishedEvent {
    cam_id: CameraId,
    ok: bool,
    anomaly: bool,
    message: String,
}

#[derive(Default)]
struct FetchTask {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

/// One controller per camera. Owns the local clip view and its fetch loop,
/// runs uploads against the analysis endpoint, and forwards resets into
/// the shared store.
#[derive(Clone)]
pub struct CameraController {
    cam_id: CameraId,
    view: Arc<StdMutex<CameraView>>,
    api: ApiClient,
    anomalies: AnomalyController,
    app_handle: AppHandle,
    download_dir: PathBuf,
    fetch_task: Arc<Mutex<FetchTask>>,
}

impl CameraController {
    pub fn new(
        cam_id: CameraId,
        api: ApiClient,
        anomalies: AnomalyController,
        app_handle: AppHandle,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            cam_id,
            view: Arc::new(StdMutex::new(CameraView::default())),
            api,
            anomalies,
            app_handle,
            download_dir,
            fetch_task: Arc::new(Mutex::new(FetchTask::default())),
        }
    }

    pub fn view_snapshot(&self) -> CameraView {
        self.view.lock().unwrap().clone()
    }

    pub async fn start_fetch_loop(&self) -> Result<()> {
        let mut task = self.fetch_task.lock().await;
        if task.handle.is_some() {
            bail!("clip fetch already active for {}", self.cam_id.as_str());
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(clip_fetch_loop(
            self.cam_id,
            Arc::clone(&self.view),
            self.api.clone(),
            self.app_handle.clone(),
            self.download_dir.clone(),
            cancel_token.clone(),
        ));

        task.handle = Some(handle);
        task.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_fetch_loop(&self) -> Result<()> {
        let mut task = self.fetch_task.lock().await;
        if let Some(token) = task.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = task.handle.take() {
            handle
                .await
                .context("clip fetch task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Uploads one video for analysis. Progress and the final outcome are
    /// reported through `upload-progress` / `upload-finished` events; the
    /// uploading flag clears on every path.
    pub async fn upload_video(&self, path: PathBuf) -> Result<()> {
        {
            let mut view = self.view.lock().unwrap();
            if view.uploading {
                bail!("upload already in progress for {}", self.cam_id.as_str());
            }
            view.uploading = true;
            view.upload_progress = 0;
        }
        self.emit_progress(0);

        let cam = self.cam_id;
        let progress_view = Arc::clone(&self.view);
        let progress_handle = self.app_handle.clone();
        let result = self
            .api
            .analyze(cam, &path, move |percent| {
                if let Ok(mut view) = progress_view.lock() {
                    view.upload_progress = percent;
                }
                let _ = progress_handle.emit(
                    "upload-progress",
                    UploadProgressEvent {
                        cam_id: cam,
                        percent,
                    },
                );
            })
            .await;

        {
            let mut view = self.view.lock().unwrap();
            view.uploading = false;
        }

        let event = match result {
            Ok(outcome) if outcome.ok => {
                let anomaly = outcome.body.anomaly;
                if anomaly {
                    self.anomalies
                        .set_anomaly(cam, response_clip(cam, &outcome.body))
                        .await?;
                }
                UploadFinishedEvent {
                    cam_id: cam,
                    ok: true,
                    anomaly,
                    message: if anomaly {
                        "Upload successful! Anomaly detected.".to_string()
                    } else {
                        "Upload successful! No anomaly detected.".to_string()
                    },
                }
            }
            Ok(outcome) => {
                let reason = outcome
                    .body
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string());
                UploadFinishedEvent {
                    cam_id: cam,
                    ok: false,
                    anomaly: false,
                    message: format!("Upload failed! {reason}"),
                }
            }
            Err(err) => {
                error!("upload for {} failed: {err:#}", cam.as_str());
                UploadFinishedEvent {
                    cam_id: cam,
                    ok: false,
                    anomaly: false,
                    message: "Upload failed due to network error".to_string(),
                }
            }
        };

        self.app_handle
            .emit("upload-finished", event)
            .map_err(|err| anyhow!("failed to emit upload-finished: {err}"))
    }

    /// Acknowledges this camera: store flag down, local view back to its
    /// initial shape (clip, progress, uploading flag, download memory).
    pub async fn reset(&self) -> Result<()> {
        self.anomalies.reset_anomaly(self.cam_id).await?;

        {
            let mut view = self.view.lock().unwrap();
            *view = CameraView::default();
        }

        let _ = self.app_handle.emit(
            "camera-clip-changed",
            CameraClipChangedEvent {
                cam_id: self.cam_id,
                clip: None,
            },
        );
        Ok(())
    }

    fn emit_progress(&self, percent: u8) {
        let _ = self.app_handle.emit(
            "upload-progress",
            UploadProgressEvent {
                cam_id: self.cam_id,
                percent,
            },
        );
    }
}

/// Clip reference carried by an anomalous analyze response, if it has one.
fn response_clip(cam: CameraId, body: &AnalyzeResponse) -> Option<Clip> {
    if body.url.is_none() && body.filename.is_none() {
        return None;
    }

    Some(Clip {
        cam_id: Some(cam.as_str().to_string()),
        filename: body.filename.clone().unwrap_or_default(),
        url: body.url.clone().unwrap_or_default(),
    })
}

/// Holds the four per-camera controllers for command dispatch.
pub struct CameraSupervisor {
    controllers: BTreeMap<CameraId, CameraController>,
}

impl CameraSupervisor {
    pub fn new(
        api: ApiClient,
        anomalies: AnomalyController,
        app_handle: AppHandle,
        download_dir: PathBuf,
    ) -> Self {
        let controllers = CameraId::ALL
            .iter()
            .map(|cam| {
                (
                    *cam,
                    CameraController::new(
                        *cam,
                        api.clone(),
                        anomalies.clone(),
                        app_handle.clone(),
                        download_dir.clone(),
                    ),
                )
            })
            .collect();

        Self { controllers }
    }

    pub fn get(&self, cam: CameraId) -> &CameraController {
        // The map is built from CameraId::ALL, so every id resolves.
        &self.controllers[&cam]
    }

    pub async fn start_all(&self) -> Result<()> {
        for controller in self.controllers.values() {
            controller.start_fetch_loop().await?;
        }
        Ok(())
    }

    /// Bounces every fetch loop, e.g. after the server address changed, so
    /// the first tick against the new address fires immediately.
    pub async fn restart_all(&self) -> Result<()> {
        for controller in self.controllers.values() {
            controller.stop_fetch_loop().await?;
            controller.start_fetch_loop().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_clip_requires_a_reference() {
        let empty = AnalyzeResponse {
            anomaly: true,
            ..Default::default()
        };
        assert!(response_clip(CameraId::Cam1, &empty).is_none());

        let with_url = AnalyzeResponse {
            anomaly: true,
            url: Some("/clips/clip_3.mp4".to_string()),
            ..Default::default()
        };
        let clip = response_clip(CameraId::Cam1, &with_url).unwrap();
        assert_eq!(clip.cam_id.as_deref(), Some("cam1"));
        assert_eq!(clip.url, "/clips/clip_3.mp4");
        assert!(clip.filename.is_empty());
    }
}
