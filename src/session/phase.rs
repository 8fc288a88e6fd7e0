//! The phase of a conversion job.
//!
//! The service is the source of truth for phase names and may send any text.
//! The strings it is known to use are mapped onto dedicated variants; anything
//! else is kept verbatim in [`Phase::Reported`]. Every phase renders back to
//! the exact string it came from.

use crate::error::SessionFailure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal success marker sent by the Status Endpoint.
pub const STATUS_COMPLETED: &str = "completed";
/// Audio-creation sub-phase; drives the countdown display.
pub const STATUS_CREATING_AUDIO: &str = "Creating audio file...";
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_SUBMITTING: &str = "Submitting...";

/// Current state of a conversion session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", content = "detail", rename_all = "snake_case")]
pub enum Phase {
    /// No job submitted yet.
    #[default]
    Idle,
    /// Waiting on the Submission Endpoint.
    Submitting,
    /// Job accepted; waiting for the first interesting status.
    Processing,
    /// The service is synthesising speech.
    CreatingAudio,
    /// Terminal: the audio file exists.
    Completed,
    /// Terminal: submission or polling failed.
    Failed(SessionFailure),
    /// Any other status text the service reported.
    Reported(String),
}

impl Phase {
    /// Map a Status Endpoint string onto a phase. Matching is exact.
    pub fn from_status(status: &str) -> Self {
        match status {
            STATUS_COMPLETED => Phase::Completed,
            STATUS_CREATING_AUDIO => Phase::CreatingAudio,
            STATUS_PROCESSING => Phase::Processing,
            STATUS_SUBMITTING => Phase::Submitting,
            other => Phase::Reported(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed(_))
    }

    pub fn is_creating_audio(&self) -> bool {
        matches!(self, Phase::CreatingAudio)
    }

    /// The status line shown to the user.
    pub fn label(&self) -> &str {
        match self {
            Phase::Idle => "",
            Phase::Submitting => STATUS_SUBMITTING,
            Phase::Processing => STATUS_PROCESSING,
            Phase::CreatingAudio => STATUS_CREATING_AUDIO,
            Phase::Completed => STATUS_COMPLETED,
            Phase::Failed(SessionFailure::Submission { .. }) => "Failed to submit URL.",
            Phase::Failed(SessionFailure::Poll { .. }) => "Error fetching status.",
            Phase::Reported(s) => s,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
