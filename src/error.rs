//! Error types for the article2audio client.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Article2AudioError`]: **fatal** to a library call, e.g. a malformed
//!   URL or an error status from the service. Returned as
//!   `Err(Article2AudioError)`.
//!
//! * [`SessionFailure`]: the reason a conversion session ended in the
//!   `failed` phase. Stored inside [`crate::session::Phase::Failed`] so the
//!   presentation layer can render it alongside the other phases instead of
//!   receiving it through a separate error channel.
//!
//! A poll or submit response that arrives for a session that has already
//! been torn down or superseded is not an error at all: it is dropped by the
//! controller and only shows up in `debug` logs.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the article2audio library.
#[derive(Debug, Error)]
pub enum Article2AudioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The string handed to `submit` is empty or not an HTTP/HTTPS URL.
    #[error("Invalid article URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// The Submission Endpoint rejected the request or could not be reached.
    #[error("Failed to submit '{url}': {detail}\nResubmit to try again.")]
    SubmissionFailed {
        url: String,
        detail: String,
        /// The service refused the bearer token.
        unauthorized: bool,
    },

    /// Polling the Status Endpoint failed and monitoring was abandoned.
    #[error("Lost track of job '{task_id}' after {attempts} attempt(s): {detail}")]
    PollFailed {
        task_id: String,
        attempts: u32,
        detail: String,
        unauthorized: bool,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never produced a response (DNS, connect, timeout).
    #[error("Request to '{endpoint}' failed: {reason}\nCheck the service URL and your connection.")]
    RequestFailed { endpoint: String, reason: String },

    /// The service answered with a non-success status.
    #[error("'{endpoint}' returned HTTP {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The service rejected the bearer token (401/403).
    #[error("Not authorised by '{endpoint}'\nSign in again with: article2audio login --token <TOKEN>")]
    Unauthorized { endpoint: String },

    /// The response body did not match the expected JSON shape.
    #[error("Unexpected response from '{endpoint}': {detail}")]
    DecodeFailed { endpoint: String, detail: String },

    // ── Download errors ───────────────────────────────────────────────────
    /// The audio payload stream broke off mid-transfer.
    #[error("Download of audio file '{id}' failed: {reason}")]
    DownloadFailed { id: String, reason: String },

    /// Could not create or write the downloaded audio file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Token store errors ────────────────────────────────────────────────
    /// Reading, writing or removing the persisted bearer token failed.
    #[error("Token store '{path}': {source}")]
    TokenStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Article2AudioError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Used by the opt-in poll retry: transport failures and 5xx answers are
    /// retried, everything else (404 for an unknown job, 401, bad JSON) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Article2AudioError::RequestFailed { .. } => true,
            Article2AudioError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the service refused the bearer token, directly or as the
    /// cause of a failed session.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Article2AudioError::Unauthorized { .. } => true,
            Article2AudioError::SubmissionFailed { unauthorized, .. }
            | Article2AudioError::PollFailed { unauthorized, .. } => *unauthorized,
            _ => false,
        }
    }
}

/// Why a conversion session ended in the `failed` phase.
///
/// Neither variant is retried automatically; recovery is always a fresh
/// `submit()` by the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SessionFailure {
    /// The Submission Endpoint call failed.
    #[error("Failed to submit URL: {detail}")]
    Submission {
        detail: String,
        #[serde(default)]
        unauthorized: bool,
    },

    /// The Status Endpoint call failed and polling was halted.
    #[error("Error fetching status for '{task_id}' after {attempts} attempt(s): {detail}")]
    Poll {
        task_id: String,
        attempts: u32,
        detail: String,
        #[serde(default)]
        unauthorized: bool,
    },
}

impl SessionFailure {
    /// Whether the failing call was refused for its bearer token.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            SessionFailure::Submission { unauthorized, .. }
            | SessionFailure::Poll { unauthorized, .. } => *unauthorized,
        }
    }
}
