use std::{path::Path, sync::Arc};

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use reqwest::{multipart, Body};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::anomaly::{CameraId, Clip};
use crate::settings::SettingsStore;

/// Decoded body of `POST /api/analyze`. Every field is optional on the
/// wire; a missing or unparsable body decodes to the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResponse {
    pub anomaly: bool,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    /// Whether the service answered with a 2xx status.
    pub ok: bool,
    pub body: AnalyzeResponse,
}

/// HTTP client for the anomaly service. The base address is read from the
/// settings store on every call, so the poller, the per-camera fetchers and
/// uploads always agree on where the service lives.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    settings: Arc<SettingsStore>,
}

impl ApiClient {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn base(&self) -> String {
        let base = self.settings.server().base_url;
        base.trim_end_matches('/').to_string()
    }

    /// Fetches the full abnormal-clip list. Errors on transport failure,
    /// non-2xx status, or a non-array body; clip entries that fail to
    /// decode are dropped individually.
    pub async fn abnormal_clips(&self) -> Result<Vec<Clip>> {
        let url = format!("{}/api/abnormal_clips", self.base());
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !res.status().is_success() {
            bail!("abnormal_clips returned {}", res.status());
        }

        let body: Value = res
            .json()
            .await
            .context("abnormal_clips body is not valid JSON")?;
        let Value::Array(items) = body else {
            bail!("abnormal_clips body is not an array");
        };

        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }

    /// Uploads a video for analysis as multipart form data, streaming the
    /// file and reporting integer upload percentages as they change. The
    /// decoded body is returned for both success and rejection statuses,
    /// mirroring how the service reports `error` alongside non-200s.
    pub async fn analyze<F>(
        &self,
        cam: CameraId,
        path: &Path,
        mut on_progress: F,
    ) -> Result<AnalyzeOutcome>
    where
        F: FnMut(u8) + Send + 'static,
    {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let total = file.metadata().await?.len();

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.mp4")
            .to_string();

        let mut sent: u64 = 0;
        let mut last_percent: Option<u8> = None;
        let counted = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                if let Some(percent) = upload_percent(sent, total) {
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        on_progress(percent);
                    }
                }
            }
            chunk
        });

        let part = multipart::Part::stream_with_length(Body::wrap_stream(counted), total)
            .file_name(filename)
            .mime_str("video/mp4")?;
        let form = multipart::Form::new()
            .part("video", part)
            .text("camId", cam.as_str());

        let url = format!("{}/api/analyze", self.base());
        let res = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("upload to {url} failed"))?;

        let ok = res.status().is_success();
        let text = res.text().await.unwrap_or_default();
        let body = decode_analyze_body(&text);

        Ok(AnalyzeOutcome { ok, body })
    }

    /// Streams a clip asset to `dest_dir`, returning the written path.
    pub async fn download_clip(
        &self,
        url_path: &str,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<std::path::PathBuf> {
        let url = format!("{}{}", self.base(), url_path);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !res.status().is_success() {
            bail!("clip download returned {}", res.status());
        }

        let name = if filename.is_empty() {
            url_path.rsplit('/').next().unwrap_or("clip.mp4")
        } else {
            filename
        };
        let dest = dest_dir.join(name);

        let mut file = tokio::fs::File::create(&dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;
        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("clip download interrupted")?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(dest)
    }
}

/// Integer upload percentage, or None when the total length is not
/// computable (zero-length file).
pub fn upload_percent(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    Some(((sent as f64 / total as f64) * 100.0).round() as u8)
}

fn decode_analyze_body(text: &str) -> AnalyzeResponse {
    serde_json::from_str(text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_rounded_from_byte_counts() {
        assert_eq!(upload_percent(50, 200), Some(25));
        assert_eq!(upload_percent(1, 3), Some(33));
        assert_eq!(upload_percent(2, 3), Some(67));
        assert_eq!(upload_percent(200, 200), Some(100));
    }

    #[test]
    fn percent_is_omitted_without_computable_length() {
        assert_eq!(upload_percent(10, 0), None);
    }

    #[test]
    fn analyze_body_tolerates_missing_fields() {
        let body = decode_analyze_body(r#"{"anomaly": true, "url": "/clips/a.mp4"}"#);
        assert!(body.anomaly);
        assert_eq!(body.url.as_deref(), Some("/clips/a.mp4"));
        assert!(body.filename.is_none());

        let empty = decode_analyze_body("");
        assert!(!empty.anomaly);
        assert!(empty.error.is_none());
    }

    #[test]
    fn clip_entries_decode_with_extra_and_missing_fields() {
        let raw = r#"{"camId": "cam2", "filename": "clip_4.mp4", "url": "/c", "score": 0.9}"#;
        let clip: Clip = serde_json::from_str(raw).unwrap();
        assert_eq!(clip.cam_id.as_deref(), Some("cam2"));

        let bare: Clip = serde_json::from_str(r#"{"filename": "clip_1.mp4"}"#).unwrap();
        assert!(bare.cam_id.is_none());
        assert!(bare.url.is_empty());
    }
}
