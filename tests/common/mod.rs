//! Scripted in-memory service shared by the integration tests.

#![allow(dead_code)]

use article2audio::{
    Article2AudioError, ClientConfig, ConversionApi, Phase, SessionFailure, SessionId,
    SessionProgressCallback, StatusResponse, SubmitResponse,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// One scripted Status Endpoint answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(&'static str),
    /// Non-success HTTP status; 401 and 403 reject the token.
    Http(u16),
    /// Connection-level failure.
    Unreachable,
}

/// A fake service whose answers are fixed up front.
///
/// Status replies are consumed in order across sessions; once the script
/// runs out the last reply repeats.
pub struct ScriptedApi {
    estimate: u64,
    reject_submit: Option<u16>,
    submit_delay: Duration,
    status_delay: Duration,
    statuses: Vec<Reply>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new(estimate: u64, statuses: Vec<Reply>) -> Self {
        Self {
            estimate,
            reject_submit: None,
            submit_delay: Duration::ZERO,
            status_delay: Duration::ZERO,
            statuses,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_submit: Some(status),
            ..Self::new(0, vec![])
        }
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Every status answer takes `delay` to arrive.
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionApi for ScriptedApi {
    async fn submit(&self, _url: &str) -> Result<SubmitResponse, Article2AudioError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        if let Some(status) = self.reject_submit {
            return Err(Article2AudioError::HttpStatus {
                endpoint: "/process_article".into(),
                status,
                body: "rejected".into(),
            });
        }
        let task_id = if n == 0 {
            "abc".to_string()
        } else {
            format!("abc-{}", n + 1)
        };
        Ok(SubmitResponse {
            task_id,
            estimated_time: self.estimate,
        })
    }

    async fn status(&self, task_id: &str) -> Result<StatusResponse, Article2AudioError> {
        let n = self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        let reply = self
            .statuses
            .get(n)
            .or_else(|| self.statuses.last())
            .cloned()
            .unwrap_or(Reply::Status("Processing..."));
        let endpoint = format!("/status/{task_id}");
        match reply {
            Reply::Status(s) => Ok(StatusResponse {
                status: s.to_string(),
            }),
            Reply::Http(401 | 403) => Err(Article2AudioError::Unauthorized { endpoint }),
            Reply::Http(status) => Err(Article2AudioError::HttpStatus {
                endpoint,
                status,
                body: "scripted failure".into(),
            }),
            Reply::Unreachable => Err(Article2AudioError::RequestFailed {
                endpoint,
                reason: "connection refused".into(),
            }),
        }
    }
}

/// Records every progress event as a short line.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionProgressCallback for Recorder {
    fn on_submit_start(&self, _session: SessionId, url: &str) {
        self.push(format!("submit {url}"));
    }

    fn on_submitted(&self, _session: SessionId, task_id: &str, estimated_secs: u64) {
        self.push(format!("submitted {task_id} {estimated_secs}"));
    }

    fn on_status(&self, _session: SessionId, phase: &Phase) {
        self.push(format!("status {phase}"));
    }

    fn on_countdown(&self, _session: SessionId, remaining_secs: u64) {
        self.push(format!("countdown {remaining_secs}"));
    }

    fn on_completed(&self, _session: SessionId, task_id: &str) {
        self.push(format!("completed {task_id}"));
    }

    fn on_failed(&self, _session: SessionId, failure: &SessionFailure) {
        self.push(format!("failed {failure}"));
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows stale
/// discards and retries.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default timings (5 s poll, 1 s countdown) with `recorder` attached.
pub fn config_with(recorder: &Arc<Recorder>) -> ClientConfig {
    init_tracing();
    ClientConfig::builder()
        .progress_callback(Arc::clone(recorder) as Arc<dyn SessionProgressCallback>)
        .build()
        .unwrap()
}
