//! Audio download: stream `GET /download/{id}` to disk.
//!
//! The filename comes from the `Content-Disposition` header the service sets
//! (`attachment; filename="Some Article.mp3"`). The payload is written to a
//! hidden temporary sibling first and renamed into place once complete, so
//! an interrupted download never leaves a truncated audio file behind.

use super::http::{check_status, HttpApi};
use crate::error::Article2AudioError;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// `filename="..."` or bare `filename=...`.
static RE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"([^"]*)"|([^;]*))"#).unwrap());

/// RFC 5987 `filename*=UTF-8''...`.
static RE_FILENAME_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|;)\s*filename\*\s*=\s*(?:[\w-]+'[^']*')?"?([^";]*)"?"#).unwrap());

impl HttpApi {
    /// Download audio file `id` into `dest_dir` and return the final path.
    ///
    /// `on_progress` receives `(bytes_downloaded, total_size_option)` after
    /// every received chunk. Pass `None` to suppress progress callbacks.
    pub async fn download(
        &self,
        id: &str,
        dest_dir: &Path,
        on_progress: Option<&(dyn Fn(u64, Option<u64>) + Send + Sync)>,
    ) -> Result<PathBuf, Article2AudioError> {
        let path = format!("/download/{id}");
        info!("Downloading audio file {}", id);

        let url = self.config.resource("/download", id)?;
        let response = self
            .send_with_timeout(&path, self.get_url(url), self.config.download_timeout_secs)
            .await?;
        let response = check_status(&path, response).await?;

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| fallback_filename(id));
        let total = response.content_length();

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| Article2AudioError::OutputWriteFailed {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;

        let final_path = dest_dir.join(&file_name);
        let tmp_path = dest_dir.join(format!(".{file_name}.part"));
        let write_err = |e: std::io::Error| Article2AudioError::OutputWriteFailed {
            path: final_path.clone(),
            source: e,
        };

        // Every failure from here on must take the temporary file with it.
        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await.map_err(write_err)?;
            let mut stream = response.bytes_stream();
            let mut downloaded: u64 = 0;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| Article2AudioError::DownloadFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                })?;
                file.write_all(&chunk).await.map_err(write_err)?;
                downloaded += chunk.len() as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }

            file.flush().await.map_err(write_err)?;
            drop(file);
            tokio::fs::rename(&tmp_path, &final_path)
                .await
                .map_err(write_err)?;
            Ok::<_, Article2AudioError>(downloaded)
        }
        .await;

        let downloaded = match written {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };

        debug!("Wrote {} bytes to {}", downloaded, final_path.display());
        Ok(final_path)
    }
}

/// Extract a safe local filename from a `Content-Disposition` value.
///
/// `filename=` wins over `filename*=` because the service only ever sets the
/// former; directory components are stripped either way.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = RE_FILENAME
        .captures(header)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .or_else(|| RE_FILENAME_EXT.captures(header).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().trim_matches('"').to_string())?;

    sanitise_filename(&raw)
}

fn sanitise_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn fallback_filename(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("audio-{safe}.mp3")
}
