use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::anomaly::AnomalyController;
use crate::api::ApiClient;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const POLL_INTERVAL_SECS: u64 = 5;

/// Fetches the full clip list and reconciles it into the store, first tick
/// immediately and then every `POLL_INTERVAL_SECS`. A failed or malformed
/// fetch leaves the store untouched; the next tick is the only retry.
pub async fn poll_loop(
    api: ApiClient,
    anomalies: AnomalyController,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Sequence reserved before the fetch so a slow response
                // cannot clobber the result of a later tick.
                let seq = anomalies.next_poll_seq();

                match api.abnormal_clips().await {
                    Ok(clips) => {
                        let applied = anomalies.apply_poll(seq, &clips).await;
                        if applied {
                            log_info!("poll {seq} reconciled {} clips", clips.len());
                        } else {
                            log_warn!("poll {seq} arrived stale, dropped");
                        }
                    }
                    Err(err) => {
                        log_warn!("poll {seq} failed: {err:#}");
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("poll loop shutting down");
                break;
            }
        }
    }
}
