use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::anomaly::AnomalyController;
use crate::api::ApiClient;

use super::loop_worker::poll_loop;

/// Owns the recurring abnormal-clip poll task. `start` and `stop` are the
/// only lifecycle operations; the loop itself lives in `loop_worker`.
pub struct PollController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl PollController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(&mut self, api: ApiClient, anomalies: AnomalyController) -> Result<()> {
        if self.handle.is_some() {
            bail!("polling already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(poll_loop(api, anomalies, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("abnormal clip polling started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("poll loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
