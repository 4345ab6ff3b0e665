use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// History keeps this many past entries plus the one appended by the
/// current reconciliation, so the chart window never exceeds 21 points.
pub const HISTORY_WINDOW: usize = 20;

const LOG_MESSAGE: &str = "Abnormal behavior detected";

/// The fixed set of monitored cameras. Unrecognized ids coming back from
/// the service are logged and skipped during reconciliation instead of
/// silently growing the maps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CameraId {
    Cam1,
    Cam2,
    Cam3,
    Cam4,
}

impl CameraId {
    pub const ALL: [CameraId; 4] = [
        CameraId::Cam1,
        CameraId::Cam2,
        CameraId::Cam3,
        CameraId::Cam4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraId::Cam1 => "cam1",
            CameraId::Cam2 => "cam2",
            CameraId::Cam3 => "cam3",
            CameraId::Cam4 => "cam4",
        }
    }

    pub fn from_wire(value: &str) -> Option<CameraId> {
        CameraId::ALL
            .iter()
            .copied()
            .find(|cam| cam.as_str() == value)
    }
}

/// One detected abnormal segment as reported by the service. `cam_id` stays
/// a raw optional string because the service may omit it or send an id we
/// do not monitor; validation happens in `reconcile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    #[serde(default)]
    pub cam_id: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyLogEntry {
    pub cam_id: CameraId,
    pub time: String,
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub time: String,
    pub count: usize,
}

/// Shared dashboard state. The anomaly flags are upload-driven and only
/// ever change through `set_anomaly`/`reset_anomaly`; frequency, logs and
/// history are poll-driven and rebuilt wholesale by `reconcile`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub anomalies: BTreeMap<CameraId, bool>,
    pub latest_clip: BTreeMap<CameraId, Clip>,
    pub cam_frequency: BTreeMap<CameraId, u32>,
    pub anomaly_logs: Vec<AnomalyLogEntry>,
    pub anomaly_history: Vec<HistoryEntry>,
    pub action_required: bool,
    #[serde(skip)]
    pub(crate) last_poll_seq: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            anomalies: CameraId::ALL.iter().map(|cam| (*cam, false)).collect(),
            latest_clip: BTreeMap::new(),
            cam_frequency: zero_frequency(),
            anomaly_logs: Vec::new(),
            anomaly_history: Vec::new(),
            action_required: false,
            last_poll_seq: 0,
        }
    }
}

fn zero_frequency() -> BTreeMap<CameraId, u32> {
    CameraId::ALL.iter().map(|cam| (*cam, 0)).collect()
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a camera anomalous after an upload the service flagged.
    /// Counts toward the frequency chart until the next poll rebuilds it.
    pub fn set_anomaly(&mut self, cam: CameraId, clip: Option<Clip>) {
        self.anomalies.insert(cam, true);

        if let Some(clip) = clip {
            self.latest_clip.insert(cam, clip);
        }

        *self.cam_frequency.entry(cam).or_insert(0) += 1;
        self.action_required = true;
    }

    /// Acknowledges one camera. Frequency, logs, history and the
    /// action-required flag are left for the next poll to recompute.
    pub fn reset_anomaly(&mut self, cam: CameraId) {
        self.anomalies.insert(cam, false);
        self.latest_clip.remove(&cam);
    }

    pub fn clear_all(&mut self) {
        let last_poll_seq = self.last_poll_seq;
        *self = Self::default();
        self.last_poll_seq = last_poll_seq;
    }

    /// Rebuilds the poll-driven state from a full clip-list snapshot.
    ///
    /// Returns false without touching anything when `seq` is not newer than
    /// the last applied poll, so a slow response cannot overwrite the
    /// result of a faster later tick. Frequency and logs are replaced
    /// wholesale; the latest-clip map is merged per camera (last clip in
    /// the list wins); the anomaly flags are never touched here.
    pub fn reconcile(&mut self, seq: u64, clips: &[Clip], now: DateTime<Local>) -> bool {
        if seq <= self.last_poll_seq {
            return false;
        }
        self.last_poll_seq = seq;

        let mut frequency = zero_frequency();
        let mut logs = Vec::new();
        let mut clip_map: BTreeMap<CameraId, Clip> = BTreeMap::new();

        for clip in clips {
            let Some(raw_id) = clip.cam_id.as_deref() else {
                continue;
            };
            let Some(cam) = CameraId::from_wire(raw_id) else {
                log::warn!("ignoring clip {} for unknown camera '{raw_id}'", clip.filename);
                continue;
            };

            *frequency.entry(cam).or_insert(0) += 1;

            logs.push(AnomalyLogEntry {
                cam_id: cam,
                time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
                message: LOG_MESSAGE.to_string(),
                filename: clip.filename.clone(),
            });

            clip_map.insert(cam, clip.clone());
        }

        self.cam_frequency = frequency;
        self.latest_clip.extend(clip_map);
        self.action_required = self.cam_frequency.values().any(|count| *count > 0);

        let count = logs.len();
        self.anomaly_logs = logs;

        if self.anomaly_history.len() > HISTORY_WINDOW {
            let excess = self.anomaly_history.len() - HISTORY_WINDOW;
            self.anomaly_history.drain(..excess);
        }
        self.anomaly_history.push(HistoryEntry {
            time: now.format("%H:%M:%S").to_string(),
            count,
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(cam: &str, filename: &str, url: &str) -> Clip {
        Clip {
            cam_id: Some(cam.to_string()),
            filename: filename.to_string(),
            url: url.to_string(),
        }
    }

    fn now() -> DateTime<Local> {
        Local::now()
    }

    #[test]
    fn reconcile_rebuilds_frequency_from_snapshot() {
        let mut state = DashboardState::new();

        let applied = state.reconcile(
            1,
            &[
                clip("cam1", "clip_1.mp4", "/a"),
                clip("cam2", "clip_2.mp4", "/b"),
            ],
            now(),
        );

        assert!(applied);
        assert_eq!(state.cam_frequency[&CameraId::Cam1], 1);
        assert_eq!(state.cam_frequency[&CameraId::Cam2], 1);
        assert_eq!(state.anomaly_logs.len(), 2);
        assert!(state.action_required);
        assert_eq!(state.anomaly_history.len(), 1);
        assert_eq!(state.anomaly_history[0].count, 2);

        // A later poll with only cam1 resets cam2 back to zero; counts are
        // never cumulative across polls.
        state.reconcile(2, &[clip("cam1", "clip_3.mp4", "/c")], now());
        assert_eq!(state.cam_frequency[&CameraId::Cam1], 1);
        assert_eq!(state.cam_frequency[&CameraId::Cam2], 0);
        assert_eq!(state.anomaly_logs.len(), 1);
    }

    #[test]
    fn reconcile_skips_clips_without_known_camera() {
        let mut state = DashboardState::new();

        let orphan = Clip {
            cam_id: None,
            filename: "clip_9.mp4".to_string(),
            url: "/x".to_string(),
        };
        state.reconcile(
            1,
            &[orphan, clip("cam9", "clip_7.mp4", "/y"), clip("cam1", "clip_1.mp4", "/a")],
            now(),
        );

        assert_eq!(state.anomaly_logs.len(), 1);
        assert_eq!(state.cam_frequency[&CameraId::Cam1], 1);
        assert_eq!(state.anomaly_history[0].count, 1);
    }

    #[test]
    fn reconcile_keeps_last_clip_in_list_per_camera() {
        let mut state = DashboardState::new();

        state.reconcile(
            1,
            &[
                clip("cam1", "clip_5.mp4", "/old"),
                clip("cam1", "clip_2.mp4", "/new"),
            ],
            now(),
        );

        // Last seen in the list wins, not the highest filename token.
        assert_eq!(state.latest_clip[&CameraId::Cam1].url, "/new");
        assert_eq!(state.cam_frequency[&CameraId::Cam1], 2);
    }

    #[test]
    fn reconcile_never_touches_anomaly_flags() {
        let mut state = DashboardState::new();
        state.set_anomaly(CameraId::Cam2, None);

        state.reconcile(1, &[clip("cam1", "clip_1.mp4", "/a")], now());

        assert!(state.anomalies[&CameraId::Cam2]);
        assert!(!state.anomalies[&CameraId::Cam1]);
    }

    #[test]
    fn stale_poll_sequence_is_rejected() {
        let mut state = DashboardState::new();

        assert!(state.reconcile(2, &[clip("cam1", "clip_1.mp4", "/a")], now()));
        // A slower response from an earlier tick arrives afterwards.
        assert!(!state.reconcile(1, &[], now()));

        assert_eq!(state.cam_frequency[&CameraId::Cam1], 1);
        assert_eq!(state.anomaly_history.len(), 1);
    }

    #[test]
    fn history_is_capped_at_window_plus_one() {
        let mut state = DashboardState::new();

        for seq in 1..=50 {
            state.reconcile(seq, &[], now());
        }

        assert_eq!(state.anomaly_history.len(), HISTORY_WINDOW + 1);
    }

    #[test]
    fn set_anomaly_flags_counts_and_records_clip() {
        let mut state = DashboardState::new();

        state.set_anomaly(
            CameraId::Cam3,
            Some(clip("cam3", "x", "/clips/x")),
        );

        assert!(state.anomalies[&CameraId::Cam3]);
        assert!(!state.anomalies[&CameraId::Cam1]);
        assert_eq!(state.latest_clip[&CameraId::Cam3].filename, "x");
        assert_eq!(state.cam_frequency[&CameraId::Cam3], 1);
        assert!(state.action_required);
    }

    #[test]
    fn reset_anomaly_leaves_frequency_and_logs_alone() {
        let mut state = DashboardState::new();
        state.reconcile(1, &[clip("cam1", "clip_1.mp4", "/a")], now());
        state.set_anomaly(CameraId::Cam1, None);

        state.reset_anomaly(CameraId::Cam1);

        assert!(!state.anomalies[&CameraId::Cam1]);
        assert!(state.latest_clip.get(&CameraId::Cam1).is_none());
        assert_eq!(state.cam_frequency[&CameraId::Cam1], 2);
        assert_eq!(state.anomaly_logs.len(), 1);
        // Stays raised until the next poll recomputes it.
        assert!(state.action_required);
    }

    #[test]
    fn clear_all_then_empty_reconcile_is_idempotent() {
        let mut state = DashboardState::new();
        state.reconcile(1, &[clip("cam1", "clip_1.mp4", "/a")], now());
        state.set_anomaly(CameraId::Cam4, Some(clip("cam4", "y", "/y")));

        state.clear_all();

        let fresh = DashboardState::new();
        assert_eq!(state.anomalies, fresh.anomalies);
        assert_eq!(state.latest_clip, fresh.latest_clip);
        assert_eq!(state.cam_frequency, fresh.cam_frequency);
        assert!(state.anomaly_logs.is_empty());
        assert!(state.anomaly_history.is_empty());
        assert!(!state.action_required);

        state.reconcile(2, &[], now());

        assert_eq!(state.anomalies, fresh.anomalies);
        assert_eq!(state.latest_clip, fresh.latest_clip);
        assert_eq!(state.cam_frequency, fresh.cam_frequency);
        assert!(state.anomaly_logs.is_empty());
        assert!(!state.action_required);
        // The tick itself is still recorded, with a zero count.
        assert_eq!(state.anomaly_history.len(), 1);
        assert_eq!(state.anomaly_history[0].count, 0);
    }
}
