use serde::Serialize;

use crate::anomaly::{CameraId, Clip};

/// Local view one camera widget renders from: the clip selected by this
/// camera's own fetch loop plus upload progress. Independent of the shared
/// store's latest-clip map by design.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub clip: Option<Clip>,
    pub uploading: bool,
    pub upload_progress: u8,
    /// Filename already auto-downloaded for this camera; guards the
    /// one-shot retrieval.
    #[serde(skip)]
    pub(crate) downloaded: Option<String>,
}

/// Picks this camera's latest clip by the numeric token in the filename
/// (`clip_12.mp4` → 12). The first clip seen wins ties, so the result is
/// deterministic for identical input ordering; clips without a parsable
/// token rank lowest.
pub fn select_latest_clip(clips: Vec<Clip>, cam: CameraId) -> Option<Clip> {
    let mut best: Option<(i64, Clip)> = None;

    for clip in clips {
        if clip.cam_id.as_deref() != Some(cam.as_str()) {
            continue;
        }

        let token = filename_token(&clip.filename);
        match &best {
            Some((current, _)) if token <= *current => {}
            _ => best = Some((token, clip)),
        }
    }

    best.map(|(_, clip)| clip)
}

/// Second `_`-separated segment of the filename, parsed as its leading
/// integer (so `12.mp4` still reads as 12).
fn filename_token(filename: &str) -> i64 {
    filename
        .split('_')
        .nth(1)
        .map(|segment| {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(i64::MIN)
        })
        .unwrap_or(i64::MIN)
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

    #[test]
    fn selects_highest_numeric_token_not_lexical() {
        let clips = vec![
            clip("cam1", "clip_5.mp4", "/a"),
            clip("cam1", "clip_12.mp4", "/b"),
            clip("cam1", "clip_3.mp4", "/c"),
        ];

        let latest = select_latest_clip(clips, CameraId::Cam1).unwrap();
        assert_eq!(latest.filename, "clip_12.mp4");
    }

    #[test]
    fn filters_to_the_bound_camera() {
        let clips = vec![
            clip("cam2", "clip_99.mp4", "/a"),
            clip("cam1", "clip_1.mp4", "/b"),
        ];

        let latest = select_latest_clip(clips, CameraId::Cam1).unwrap();
        assert_eq!(latest.filename, "clip_1.mp4");
    }

    #[test]
    fn no_matching_clip_yields_empty_view() {
        let clips = vec![clip("cam2", "clip_1.mp4", "/a")];
        assert!(select_latest_clip(clips, CameraId::Cam3).is_none());

        assert!(select_latest_clip(Vec::new(), CameraId::Cam1).is_none());
    }

    #[test]
    fn equal_tokens_resolve_to_first_in_input_order() {
        let clips = vec![
            clip("cam1", "clip_7_a.mp4", "/first"),
            clip("cam1", "clip_7_b.mp4", "/second"),
        ];

        let latest = select_latest_clip(clips, CameraId::Cam1).unwrap();
        assert_eq!(latest.url, "/first");
    }

    #[test]
    fn unparsable_tokens_rank_lowest() {
        let clips = vec![
            clip("cam1", "broken.mp4", "/a"),
            clip("cam1", "clip_2.mp4", "/b"),
        ];

        let latest = select_latest_clip(clips, CameraId::Cam1).unwrap();
        assert_eq!(latest.filename, "clip_2.mp4");
    }

    #[test]
    fn token_parses_leading_digits_of_second_segment() {
        let clips = vec![
            clip("cam1", "clip_10.mp4", "/a"),
            clip("cam1", "clip_9.mp4", "/b"),
        ];

        // "10.mp4" must read as 10, not fail the parse and lose to 9.
        let latest = select_latest_clip(clips, CameraId::Cam1).unwrap();
        assert_eq!(latest.filename, "clip_10.mp4");
    }
}
