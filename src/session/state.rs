//! Pure session state: every transition of one conversion job, without
//! timers or I/O. The controller owns a [`Session`], feeds it endpoint
//! results and turns the returned [`StatusEffect`]s into timer changes.

use super::countdown::Countdown;
use super::phase::Phase;
use crate::api::SubmitResponse;
use crate::error::SessionFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one session of a controller.
///
/// Ids increase monotonically per controller and are never reused, so a
/// result tagged with an old id can always be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// The id carried by the idle snapshot, before any submit or after teardown.
    pub const IDLE: SessionId = SessionId(0);

    pub fn new(raw: u64) -> Self {
        SessionId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A job the service accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub task_id: String,
    pub url: String,
    /// Advisory, seconds.
    pub estimated_secs: u64,
    pub submitted_at: DateTime<Utc>,
}

/// What the presentation layer sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: SessionId,
    pub phase: Phase,
    pub url: Option<String>,
    pub task_id: Option<String>,
    pub estimated_secs: u64,
    /// Present while the countdown runs, and at zero once it ran out.
    pub countdown: Option<Countdown>,
    /// Status responses applied so far.
    pub polls: u32,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            session: SessionId::IDLE,
            phase: Phase::Idle,
            url: None,
            task_id: None,
            estimated_secs: 0,
            countdown: None,
            polls: 0,
        }
    }
}

/// What a status update means for the timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusEffect {
    /// Entered the audio-creation sub-phase with a positive estimate;
    /// (re)start the countdown ticker.
    pub start_countdown: bool,
    /// Left the audio-creation sub-phase; stop the countdown ticker.
    pub stop_countdown: bool,
    /// Reached a terminal phase; stop everything.
    pub terminal: bool,
}

#[derive(Debug)]
pub(crate) struct Session {
    id: SessionId,
    url: String,
    phase: Phase,
    job: Option<ConversionJob>,
    countdown: Option<Countdown>,
    polls: u32,
}

impl Session {
    /// A fresh session; `idle → submitting` happens here.
    pub(crate) fn new(id: SessionId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            phase: Phase::Submitting,
            job: None,
            countdown: None,
            polls: 0,
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn phase(&self) -> &Phase {
        &self.phase
    }

    pub(crate) fn job(&self) -> Option<&ConversionJob> {
        self.job.as_ref()
    }

    /// `submitting → processing`.
    pub(crate) fn submitted(&mut self, response: SubmitResponse) -> &ConversionJob {
        self.phase = Phase::Processing;
        self.job.insert(ConversionJob {
            task_id: response.task_id,
            url: self.url.clone(),
            estimated_secs: response.estimated_time,
            submitted_at: Utc::now(),
        })
    }

    /// `submitting → failed`.
    pub(crate) fn submit_failed(&mut self, detail: String, unauthorized: bool) -> SessionFailure {
        let failure = SessionFailure::Submission {
            detail,
            unauthorized,
        };
        self.phase = Phase::Failed(failure.clone());
        failure
    }

    /// Apply a status string verbatim.
    pub(crate) fn status_received(&mut self, status: &str) -> StatusEffect {
        self.polls += 1;
        let was_creating = self.phase.is_creating_audio();
        self.phase = Phase::from_status(status);
        let is_creating = self.phase.is_creating_audio();

        let mut effect = StatusEffect {
            terminal: self.phase.is_terminal(),
            ..StatusEffect::default()
        };

        if is_creating && !was_creating {
            let estimate = self.job.as_ref().map_or(0, |j| j.estimated_secs);
            if estimate > 0 {
                self.countdown = Some(Countdown::seeded(estimate));
                effect.start_countdown = true;
            }
        } else if was_creating && !is_creating {
            self.countdown = None;
            effect.stop_countdown = true;
        }
        effect
    }

    /// `processing → failed`.
    pub(crate) fn poll_failed(
        &mut self,
        attempts: u32,
        detail: String,
        unauthorized: bool,
    ) -> SessionFailure {
        self.polls += 1;
        let failure = SessionFailure::Poll {
            task_id: self
                .job
                .as_ref()
                .map(|j| j.task_id.clone())
                .unwrap_or_default(),
            attempts,
            detail,
            unauthorized,
        };
        self.phase = Phase::Failed(failure.clone());
        self.countdown = None;
        failure
    }

    /// Advance the countdown by one tick. `None` when no countdown applies
    /// any more (phase moved on, or it already hit zero).
    pub(crate) fn tick_countdown(&mut self) -> Option<u64> {
        if !self.phase.is_creating_audio() {
            return None;
        }
        let countdown = self.countdown.as_mut()?;
        if countdown.is_finished() {
            return None;
        }
        Some(countdown.tick())
    }

    pub(crate) fn countdown(&self) -> Option<Countdown> {
        self.countdown
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.id,
            phase: self.phase.clone(),
            url: Some(self.url.clone()),
            task_id: self.job.as_ref().map(|j| j.task_id.clone()),
            estimated_secs: self.job.as_ref().map_or(0, |j| j.estimated_secs),
            countdown: self.countdown,
            polls: self.polls,
        }
    }
}
