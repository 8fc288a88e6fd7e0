//! Talking to the conversion service.
//!
//! The session controller only needs two calls, submit and status, so those
//! sit behind the [`ConversionApi`] trait. Tests drive the controller with a
//! scripted in-memory implementation; production code uses [`HttpApi`].
//!
//! ```text
//! POST /process_article {url}      ─▶ {task_id, estimated_time}
//! GET  /status/{task_id}           ─▶ {status}
//! GET  /audio_files                ─▶ [{id, file_name, creation_date}]
//! GET  /download/{id}              ─▶ bytes + Content-Disposition
//! GET  /get_feed_url               ─▶ {feed_url}
//! POST /verify_token {token}       ─▶ {userid, email}
//! ```
//!
//! 1. [`http`]: the reqwest-backed client for every endpoint
//! 2. [`download`]: streaming audio download and filename resolution

pub mod download;
pub mod http;

use crate::error::Article2AudioError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use http::HttpApi;

/// The two endpoints the session controller depends on.
#[async_trait]
pub trait ConversionApi: Send + Sync {
    /// `POST /process_article`: queue a conversion for `url`.
    async fn submit(&self, url: &str) -> Result<SubmitResponse, Article2AudioError>;

    /// `GET /status/{task_id}`: current phase of a queued job.
    async fn status(&self, task_id: &str) -> Result<StatusResponse, Article2AudioError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub url: &'a str,
}

/// Answer of the Submission Endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    /// Advisory estimate in seconds; negative or fractional values are
    /// clamped and rounded.
    #[serde(deserialize_with = "de_seconds")]
    pub estimated_time: u64,
}

/// Answer of the Status Endpoint. Extra fields the service sends along
/// (article name, author) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// One previously generated audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    /// Database id; the service sends a number, older deployments a string.
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub file_name: String,
    /// ISO-8601, kept verbatim. See [`AudioFile::created_at`].
    pub creation_date: String,
}

impl AudioFile {
    /// Parse `creation_date`. Values without an offset are taken as UTC.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.creation_date.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUrlResponse {
    pub feed_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyTokenRequest<'a> {
    pub token: &'a str,
}

/// Identity the service associates with a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub userid: String,
    #[serde(default)]
    pub email: Option<String>,
}

fn de_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f64::deserialize(deserializer)?;
    if v.is_finite() && v > 0.0 {
        Ok(v.round() as u64)
    } else {
        Ok(0)
    }
}

fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}
