//! Eager conversion entry points.
//!
//! Submit one article and wait for the job to finish. This is the simple
//! API: it owns a [`SessionController`] for the duration of the call and
//! returns only once the session is terminal. Use the controller directly
//! when you need to observe phases as they happen, resubmit, or tear down
//! early.

use crate::api::{ConversionApi, HttpApi};
use crate::config::ClientConfig;
use crate::error::{Article2AudioError, SessionFailure};
use crate::output::ConversionOutcome;
use crate::session::{Phase, SessionController};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Convert the article at `url` into audio on the configured service.
///
/// `token` is the bearer token, normally [`crate::TokenStore::current`].
///
/// # Errors
/// - [`Article2AudioError::InvalidUrl`] before anything is sent
/// - [`Article2AudioError::SubmissionFailed`] when the job was never accepted
/// - [`Article2AudioError::PollFailed`] when status polling broke off
pub async fn convert(
    url: impl AsRef<str>,
    config: &ClientConfig,
    token: Option<String>,
) -> Result<ConversionOutcome, Article2AudioError> {
    let api = HttpApi::new(config, token)?;
    convert_with(Arc::new(api), url, config).await
}

/// [`convert`] against any [`ConversionApi`] implementation.
pub async fn convert_with(
    api: Arc<dyn ConversionApi>,
    url: impl AsRef<str>,
    config: &ClientConfig,
) -> Result<ConversionOutcome, Article2AudioError> {
    let start = Instant::now();
    let url = url.as_ref();
    let controller = SessionController::new(api, config.clone());

    controller.submit(url).await?;
    let snap = controller.wait_for_terminal().await.ok_or_else(|| {
        Article2AudioError::Internal("session ended without a terminal phase".into())
    })?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match snap.phase {
        Phase::Completed => {
            info!(
                "Converted {} in {}ms ({} polls)",
                url.trim(),
                elapsed_ms,
                snap.polls
            );
            Ok(ConversionOutcome {
                task_id: snap.task_id.unwrap_or_default(),
                url: snap.url.unwrap_or_else(|| url.trim().to_string()),
                phase: Phase::Completed,
                estimated_secs: snap.estimated_secs,
                polls: snap.polls,
                elapsed_ms,
            })
        }
        Phase::Failed(SessionFailure::Submission {
            detail,
            unauthorized,
        }) => Err(Article2AudioError::SubmissionFailed {
            url: url.trim().to_string(),
            detail,
            unauthorized,
        }),
        Phase::Failed(SessionFailure::Poll {
            task_id,
            attempts,
            detail,
            unauthorized,
        }) => Err(Article2AudioError::PollFailed {
            task_id,
            attempts,
            detail,
            unauthorized,
        }),
        other => Err(Article2AudioError::Internal(format!(
            "session stopped in non-terminal phase '{}'",
            other
        ))),
    }
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    url: impl AsRef<str>,
    config: &ClientConfig,
    token: Option<String>,
) -> Result<ConversionOutcome, Article2AudioError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Article2AudioError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(url, config, token))
}
