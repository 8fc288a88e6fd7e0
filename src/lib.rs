//! # article2audio
//!
//! Client for an article-to-audio service: submit the URL of a written
//! article, follow the job while the service scrapes it and synthesises
//! speech, then list and download the resulting audio files or subscribe to
//! them as a podcast feed.
//!
//! ## Session Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Validate  reject empty / non-HTTP(S) input locally
//!  ├─ 2. Submit    POST /process_article → task id + estimated seconds
//!  ├─ 3. Poll      GET /status/{id} every 5 s, phase = latest status string
//!  ├─ 4. Count     1 s advisory countdown while "Creating audio file..."
//!  └─ 5. Finish    "completed" or failed; timers stop, late results dropped
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use article2audio::{convert, ClientConfig, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let token = TokenStore::load(TokenStore::default_path())?.current();
//!     let outcome = convert("https://example.com/some-post", &config, token).await?;
//!     println!("job {} finished after {} polls", outcome.task_id, outcome.polls);
//!     Ok(())
//! }
//! ```
//!
//! To render phases live, drive a [`SessionController`] yourself and read
//! [`SessionController::snapshot_stream`] or install a
//! [`SessionProgressCallback`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `article2audio` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! article2audio = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod progress;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{
    AudioFile, ConversionApi, HttpApi, StatusResponse, SubmitResponse, VerifiedUser,
};
pub use auth::{sign_in, sign_out, TokenStore};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use convert::{convert, convert_sync, convert_with};
pub use error::{Article2AudioError, SessionFailure};
pub use output::ConversionOutcome;
pub use progress::{NoopProgressCallback, ProgressCallback, SessionProgressCallback};
pub use session::{
    ConversionJob, Countdown, Phase, SessionController, SessionId, SessionSnapshot,
};
pub use stream::{snapshot_stream, SnapshotStream};
