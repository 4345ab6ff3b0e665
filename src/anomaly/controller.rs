use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::Result;
use chrono::Local;
use log::info;
use tauri::{AppHandle, Emitter};
use tokio::sync::Mutex;

use super::state::{CameraId, Clip, DashboardState};

/// Owns the shared dashboard state. Every mutation goes through here and
/// ends with an `anomaly-state-changed` event carrying the full snapshot,
/// so subscribed panels never read stale data.
#[derive(Clone)]
pub struct AnomalyController {
    state: Arc<Mutex<DashboardState>>,
    app_handle: AppHandle,
    poll_seq: Arc<AtomicU64>,
}

impl AnomalyController {
    pub fn new(app_handle: AppHandle) -> Self {
        Self {
            state: Arc::new(Mutex::new(DashboardState::new())),
            app_handle,
            poll_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    /// Reserves the sequence number for a poll tick. Taken before the fetch
    /// starts so a slow response loses to any tick scheduled after it.
    pub fn next_poll_seq(&self) -> u64 {
        self.poll_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies a fetched clip list to the store. Returns false when the
    /// response was stale and dropped.
    pub async fn apply_poll(&self, seq: u64, clips: &[Clip]) -> bool {
        let mut state = self.state.lock().await;
        let applied = state.reconcile(seq, clips, Local::now());
        if applied {
            emit_state_changed(&self.app_handle, &state);
        }
        applied
    }

    pub async fn set_anomaly(&self, cam: CameraId, clip: Option<Clip>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.set_anomaly(cam, clip);
        info!("camera {} flagged anomalous", cam.as_str());
        emit_state_changed(&self.app_handle, &state);
        Ok(())
    }

    pub async fn reset_anomaly(&self, cam: CameraId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.reset_anomaly(cam);
        info!("camera {} anomaly acknowledged", cam.as_str());
        emit_state_changed(&self.app_handle, &state);
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.clear_all();
        info!("all anomaly state cleared");
        emit_state_changed(&self.app_handle, &state);
        Ok(())
    }
}

fn emit_state_changed(app_handle: &AppHandle, state: &DashboardState) {
    let _ = app_handle.emit("anomaly-state-changed", state.clone());
}
