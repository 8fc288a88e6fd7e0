//! Configuration types for the conversion service client.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The same config drives the HTTP client, the
//! session controller's timers and the eager [`crate::convert::convert`]
//! entry point.

use crate::error::Article2AudioError;
use crate::progress::ProgressCallback;
use reqwest::Url;
use std::fmt;
use std::time::Duration;

/// Default service location when neither the builder nor the CLI set one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8001/api";

/// Configuration for talking to the conversion service.
///
/// Built via [`ClientConfig::builder()`] or using
/// [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use article2audio::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://audio.example.com/api")
///     .request_timeout_secs(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to. Default: `http://localhost:8001/api`.
    pub base_url: String,

    /// Delay between status polls in milliseconds. Default: 5000.
    ///
    /// The first poll happens one full interval after a successful
    /// submission; the service needs a moment before the job is visible.
    pub poll_interval_ms: u64,

    /// Countdown tick in milliseconds. Default: 1000.
    ///
    /// The countdown is cosmetic; changing this only changes how fast the
    /// displayed estimate runs down.
    pub countdown_tick_ms: u64,

    /// Per-request timeout for JSON endpoints in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for a whole audio download in seconds. Default: 300.
    pub download_timeout_secs: u64,

    /// Extra attempts for a failed status poll. Default: 0.
    ///
    /// With the default a single failed poll fails the session. Raising it
    /// retries transient failures (transport errors, 5xx, 429) with
    /// exponential backoff before giving up.
    pub poll_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Receives session events (submitted, status, countdown, terminal).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 5000,
            countdown_tick_ms: 1000,
            request_timeout_secs: 30,
            download_timeout_secs: 300,
            poll_retries: 0,
            retry_backoff_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("countdown_tick_ms", &self.countdown_tick_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("poll_retries", &self.poll_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn SessionProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// Join an endpoint path onto the base URL.
    ///
    /// `endpoint("/status/abc")` on `http://host/api` yields
    /// `http://host/api/status/abc`; a trailing slash on the base is ignored.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Join `path` and one opaque identifier as its final path segment.
    ///
    /// The identifier is percent-encoded, so `/`, `?` and `#` stay part of
    /// the segment instead of changing which resource is addressed.
    pub fn resource(&self, path: &str, id: &str) -> Result<String, Article2AudioError> {
        let mut url = Url::parse(&self.endpoint(path)).map_err(|e| {
            Article2AudioError::InvalidConfig(format!("base URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                Article2AudioError::InvalidConfig(format!(
                    "base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(id);
        Ok(url.into())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn countdown_tick_ms(mut self, ms: u64) -> Self {
        self.config.countdown_tick_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_retries(mut self, n: u32) -> Self {
        self.config.poll_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, Article2AudioError> {
        let c = &self.config;
        let parsed = Url::parse(&c.base_url).map_err(|e| {
            Article2AudioError::InvalidConfig(format!("base URL '{}': {}", c.base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Article2AudioError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if c.poll_interval_ms == 0 {
            return Err(Article2AudioError::InvalidConfig(
                "Poll interval must be ≥ 1ms".into(),
            ));
        }
        if c.countdown_tick_ms == 0 {
            return Err(Article2AudioError::InvalidConfig(
                "Countdown tick must be ≥ 1ms".into(),
            ));
        }
        Ok(self.config)
    }
}
