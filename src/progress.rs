//! Progress-callback trait for conversion session events.
//!
//! Inject an [`Arc<dyn SessionProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to receive
//! events as the session controller submits, polls and counts down.
//!
//! Callbacks are fired after the controller has applied the transition and
//! released its internal lock, so an implementation may call back into the
//! controller (e.g. [`crate::SessionController::snapshot`]) without
//! deadlocking. Events for a session that has been torn down or superseded
//! are never delivered.
//!
//! # Example
//!
//! ```rust
//! use article2audio::{ClientConfig, Phase, SessionId, SessionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     statuses: AtomicUsize,
//! }
//!
//! impl SessionProgressCallback for CountingCallback {
//!     fn on_status(&self, _session: SessionId, phase: &Phase) {
//!         self.statuses.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("status: {phase}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { statuses: AtomicUsize::new(0) });
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(counter as Arc<dyn SessionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::SessionFailure;
use crate::session::{Phase, SessionId};
use std::sync::Arc;

/// Called by the session controller as a job moves through its phases.
///
/// Implementations must be `Send + Sync`: the poll loop and the countdown
/// ticker run on spawned tasks. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait SessionProgressCallback: Send + Sync {
    /// Called right before the Submission Endpoint is contacted.
    fn on_submit_start(&self, session: SessionId, url: &str) {
        let _ = (session, url);
    }

    /// Called once the service accepted the URL.
    ///
    /// # Arguments
    /// * `task_id`: job identifier assigned by the service
    /// * `estimated_secs`: advisory duration estimate
    fn on_submitted(&self, session: SessionId, task_id: &str, estimated_secs: u64) {
        let _ = (session, task_id, estimated_secs);
    }

    /// Called for every applied status poll, including the terminal one.
    fn on_status(&self, session: SessionId, phase: &Phase) {
        let _ = (session, phase);
    }

    /// Called when the cosmetic countdown is seeded and on every tick.
    fn on_countdown(&self, session: SessionId, remaining_secs: u64) {
        let _ = (session, remaining_secs);
    }

    /// Called once when the service reports the job as completed.
    fn on_completed(&self, session: SessionId, task_id: &str) {
        let _ = (session, task_id);
    }

    /// Called once when the session fails (submission or polling).
    fn on_failed(&self, session: SessionId, failure: &SessionFailure) {
        let _ = (session, failure);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SessionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn SessionProgressCallback>;
