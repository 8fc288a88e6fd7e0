//! Result of an eager conversion.

use crate::session::Phase;
use serde::{Deserialize, Serialize};

/// What [`crate::convert::convert`] returns once a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Identifier the service assigned to the job.
    pub task_id: String,
    /// The article URL that was submitted, trimmed.
    pub url: String,
    /// Terminal phase; always [`Phase::Completed`] for a returned outcome.
    pub phase: Phase,
    /// Advisory estimate the service gave at submission, in seconds.
    pub estimated_secs: u64,
    /// Status responses applied before the terminal one, inclusive.
    pub polls: u32,
    /// Wall-clock time from submission to the terminal phase.
    pub elapsed_ms: u64,
}
