//! The conversion session controller.
//!
//! ## Timers and stale results
//!
//! An active session owns at most two spawned tasks: the status poll loop
//! and the countdown ticker. Both hold only the session id they were
//! started for. Before any result is applied the controller compares that
//! id with the current session's; on mismatch (teardown, resubmission) the
//! result is dropped. Aborting the task handles on teardown stops future
//! ticks, the id comparison covers responses that were already in flight.
//!
//! ## Locking
//!
//! Controller state sits behind a `std::sync::Mutex` that is never held
//! across an `.await`. Snapshots are published to the `watch` channel while
//! the lock is held so observers always see transitions in order; progress
//! callbacks are fired after the lock is released.

use super::state::{Session, SessionId, SessionSnapshot, StatusEffect};
use crate::api::{ConversionApi, StatusResponse, SubmitResponse};
use crate::config::ClientConfig;
use crate::error::{Article2AudioError, SessionFailure};
use crate::progress::ProgressCallback;
use crate::stream::{snapshot_stream, SnapshotStream};
use reqwest::Url;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Drives one conversion job at a time from submission to a terminal phase.
///
/// Dropping the controller tears down the active session.
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    api: Arc<dyn ConversionApi>,
    config: ClientConfig,
    state: Mutex<State>,
    snapshots: watch::Sender<SessionSnapshot>,
}

struct State {
    last_id: SessionId,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    session: Session,
    poll_task: Option<JoinHandle<()>>,
    countdown_task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn stop_timers(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        self.stop_countdown();
    }

    fn stop_countdown(&mut self) {
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }
    }
}

impl State {
    /// The active session, if `id` still names it.
    fn current(&mut self, id: SessionId) -> Option<&mut ActiveSession> {
        self.active.as_mut().filter(|a| a.session.id() == id)
    }
}

/// Deferred progress notification, fired once the lock is released.
enum Event {
    Submitted { task_id: String, estimate: u64 },
    Status(super::Phase),
    Countdown(u64),
    Completed(String),
    Failed(SessionFailure),
}

impl SessionController {
    pub fn new(api: Arc<dyn ConversionApi>, config: ClientConfig) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::idle());
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                state: Mutex::new(State {
                    last_id: SessionId::IDLE,
                    active: None,
                }),
                snapshots,
            }),
        }
    }

    /// Current phase and advisory timing.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Follow the current (or next) session until it finishes.
    pub fn snapshot_stream(&self) -> SnapshotStream {
        snapshot_stream(self.subscribe())
    }

    /// Whether a timer of the current session is still scheduled.
    pub fn has_pending_timers(&self) -> bool {
        let state = self.shared.lock();
        state.active.as_ref().is_some_and(|a| {
            a.poll_task.as_ref().is_some_and(|t| !t.is_finished())
                || a.countdown_task.as_ref().is_some_and(|t| !t.is_finished())
        })
    }

    /// Submit `url` and start tracking the resulting job.
    ///
    /// Any previous session is torn down first; its late responses are
    /// discarded. Returns once the submission outcome is applied: the phase
    /// is then either `processing` (polling started) or `failed`.
    ///
    /// Dropping the returned future before the service answers abandons the
    /// session: the snapshot returns to idle and `wait_for_terminal()`
    /// resolves to `None`.
    ///
    /// # Errors
    /// Only [`Article2AudioError::InvalidUrl`]; endpoint failures are
    /// reported through the `failed` phase.
    pub async fn submit(&self, url: &str) -> Result<SessionId, Article2AudioError> {
        let url = validate_url(url)?;

        let id = {
            let mut state = self.shared.lock();
            if let Some(mut previous) = state.active.take() {
                debug!("Superseding session {}", previous.session.id());
                previous.stop_timers();
            }
            let id = state.last_id.next();
            state.last_id = id;
            let session = Session::new(id, url.clone());
            self.shared.snapshots.send_replace(session.snapshot());
            state.active = Some(ActiveSession {
                session,
                poll_task: None,
                countdown_task: None,
            });
            id
        };

        info!("Session {}: submitting {}", id, url);
        if let Some(ref cb) = self.shared.config.progress_callback {
            cb.on_submit_start(id, &url);
        }

        let mut pending = PendingSubmit {
            shared: &self.shared,
            id: Some(id),
        };
        let result = self.shared.api.submit(&url).await;
        pending.id = None;
        Shared::apply_submission(&self.shared, id, result);
        Ok(id)
    }

    /// Wait until the current session reaches a terminal phase.
    ///
    /// Resolves to `None` when there is no session, or when it is torn down
    /// or superseded before finishing.
    pub async fn wait_for_terminal(&self) -> Option<SessionSnapshot> {
        let mut rx = self.subscribe();
        let id = rx.borrow().session;
        if id == SessionId::IDLE {
            return None;
        }
        loop {
            {
                let snap = rx.borrow_and_update();
                if snap.session != id {
                    return None;
                }
                if snap.phase.is_terminal() {
                    return Some(snap.clone());
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Cancel both timers and forget the current session.
    ///
    /// Responses still in flight are discarded on arrival. The published
    /// snapshot returns to idle.
    pub fn teardown(&self) {
        let mut state = self.shared.lock();
        if let Some(mut active) = state.active.take() {
            active.stop_timers();
            debug!("Session {} torn down", active.session.id());
        }
        self.shared.snapshots.send_replace(SessionSnapshot::idle());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if let Some(mut active) = state.active.take() {
            active.stop_timers();
        }
    }
}

/// Abandons a session whose submit call was cancelled before it finished.
struct PendingSubmit<'a> {
    shared: &'a Shared,
    id: Option<SessionId>,
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        let Some(id) = self.id else {
            return;
        };
        let mut state = self.shared.lock();
        if state.current(id).is_none() {
            return;
        }
        if let Some(mut active) = state.active.take() {
            active.stop_timers();
            debug!("Session {} abandoned before the submission answered", id);
            self.shared.snapshots.send_replace(SessionSnapshot::idle());
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Every transition completes before the guard drops; poisoning leaves
        // the state consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, id: SessionId, events: Vec<Event>) {
        let Some(ref cb) = self.config.progress_callback else {
            return;
        };
        for event in events {
            dispatch(cb, id, event);
        }
    }

    fn apply_submission(
        this: &Arc<Self>,
        id: SessionId,
        result: Result<SubmitResponse, Article2AudioError>,
    ) {
        let events = {
            let mut state = this.lock();
            let Some(active) = state.current(id) else {
                debug!("Session {}: discarding stale submission response", id);
                return;
            };

            match result {
                Ok(response) => {
                    let job = active.session.submitted(response);
                    let (task_id, estimate) = (job.task_id.clone(), job.estimated_secs);
                    info!(
                        "Session {}: job {} accepted, estimated {}s",
                        id, task_id, estimate
                    );
                    active.poll_task = Some(tokio::spawn(poll_loop(
                        Arc::clone(this),
                        id,
                        task_id.clone(),
                    )));
                    this.snapshots.send_replace(active.session.snapshot());
                    vec![Event::Submitted { task_id, estimate }]
                }
                Err(e) => {
                    warn!("Session {}: submission failed: {}", id, e);
                    let failure = active
                        .session
                        .submit_failed(e.to_string(), e.is_unauthorized());
                    this.snapshots.send_replace(active.session.snapshot());
                    vec![Event::Failed(failure)]
                }
            }
        };
        this.notify(id, events);
    }

    /// Apply one poll outcome. Returns whether polling should continue.
    fn apply_poll(
        this: &Arc<Self>,
        id: SessionId,
        outcome: Result<StatusResponse, (u32, Article2AudioError)>,
    ) -> bool {
        let (events, keep_polling) = {
            let mut state = this.lock();
            let Some(active) = state.current(id) else {
                debug!("Session {}: discarding stale status response", id);
                return false;
            };

            match outcome {
                Ok(StatusResponse { status }) => {
                    debug!("Session {}: status {:?}", id, status);
                    let effect = active.session.status_received(&status);
                    let mut events = vec![Event::Status(active.session.phase().clone())];
                    apply_effect(this, id, active, effect, &mut events);
                    this.snapshots.send_replace(active.session.snapshot());
                    (events, !effect.terminal)
                }
                Err((attempts, e)) => {
                    warn!(
                        "Session {}: polling stopped after {} attempt(s): {}",
                        id, attempts, e
                    );
                    let failure = active.session.poll_failed(
                        attempts,
                        e.to_string(),
                        e.is_unauthorized(),
                    );
                    active.poll_task = None;
                    active.stop_countdown();
                    this.snapshots.send_replace(active.session.snapshot());
                    (vec![Event::Failed(failure)], false)
                }
            }
        };
        this.notify(id, events);
        keep_polling
    }

    /// Apply one countdown tick. Returns whether the ticker should continue.
    fn apply_tick(&self, id: SessionId) -> bool {
        let remaining = {
            let mut state = self.lock();
            let Some(active) = state.current(id) else {
                return false;
            };
            let Some(remaining) = active.session.tick_countdown() else {
                active.countdown_task = None;
                return false;
            };
            if remaining == 0 {
                active.countdown_task = None;
            }
            self.snapshots.send_replace(active.session.snapshot());
            remaining
        };
        self.notify(id, vec![Event::Countdown(remaining)]);
        remaining > 0
    }

    /// Call the Status Endpoint, retrying transient failures when configured.
    async fn fetch_status(
        &self,
        id: SessionId,
        task_id: &str,
    ) -> Result<StatusResponse, (u32, Article2AudioError)> {
        let retries = self.config.poll_retries;
        let mut attempt: u32 = 0;
        loop {
            match self.api.status(task_id).await {
                Ok(r) => return Ok(r),
                Err(e) if attempt < retries && e.is_transient() => {
                    attempt += 1;
                    let backoff = self
                        .config
                        .retry_backoff_ms
                        .saturating_mul(2u64.saturating_pow(attempt - 1));
                    warn!(
                        "Session {}: poll retry {}/{} after {}ms: {}",
                        id, attempt, retries, backoff, e
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err((attempt + 1, e)),
            }
        }
    }
}

/// Turn a status effect into timer changes on the active session.
fn apply_effect(
    this: &Arc<Shared>,
    id: SessionId,
    active: &mut ActiveSession,
    effect: StatusEffect,
    events: &mut Vec<Event>,
) {
    if effect.terminal {
        // The poll loop exits on its own once this returns false.
        active.poll_task = None;
        active.stop_countdown();
        match active.session.phase() {
            super::Phase::Completed => {
                let task_id = active
                    .session
                    .job()
                    .map(|j| j.task_id.clone())
                    .unwrap_or_default();
                info!("Session {}: job {} completed", id, task_id);
                events.push(Event::Completed(task_id));
            }
            super::Phase::Failed(f) => events.push(Event::Failed(f.clone())),
            _ => {}
        }
        return;
    }
    if effect.stop_countdown {
        active.stop_countdown();
    }
    if effect.start_countdown {
        active.stop_countdown();
        if let Some(countdown) = active.session.countdown() {
            events.push(Event::Countdown(countdown.remaining()));
        }
        active.countdown_task = Some(tokio::spawn(countdown_loop(Arc::clone(this), id)));
    }
}

async fn poll_loop(shared: Arc<Shared>, id: SessionId, task_id: String) {
    let period = shared.config.poll_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = shared.fetch_status(id, &task_id).await;
        if !Shared::apply_poll(&shared, id, outcome) {
            return;
        }
    }
}

async fn countdown_loop(shared: Arc<Shared>, id: SessionId) {
    let period = shared.config.countdown_tick();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.apply_tick(id) {
            return;
        }
    }
}

fn dispatch(cb: &ProgressCallback, id: SessionId, event: Event) {
    match event {
        Event::Submitted { task_id, estimate } => cb.on_submitted(id, &task_id, estimate),
        Event::Status(phase) => cb.on_status(id, &phase),
        Event::Countdown(remaining) => cb.on_countdown(id, remaining),
        Event::Completed(task_id) => cb.on_completed(id, &task_id),
        Event::Failed(failure) => cb.on_failed(id, &failure),
    }
}

/// Reject empty and non-HTTP(S) input before anything is sent.
pub(crate) fn validate_url(input: &str) -> Result<String, Article2AudioError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Article2AudioError::InvalidUrl {
            input: input.to_string(),
            reason: "URL is empty".into(),
        });
    }
    let parsed = Url::parse(trimmed).map_err(|e| Article2AudioError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(Article2AudioError::InvalidUrl {
            input: input.to_string(),
            reason: "expected an http:// or https:// address".into(),
        });
    }
    Ok(trimmed.to_string())
}
