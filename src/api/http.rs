//! reqwest-backed client for the conversion service.
//!
//! One [`HttpApi`] carries one bearer token for its whole lifetime. The token
//! is handed in at construction; this module never reads the token store, so
//! switching accounts means building a new client.

use super::{
    AudioFile, ConversionApi, FeedUrlResponse, StatusResponse, SubmitRequest, SubmitResponse,
    VerifiedUser, VerifyTokenRequest,
};
use crate::config::ClientConfig;
use crate::error::Article2AudioError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Longest error body echoed back in [`Article2AudioError::HttpStatus`].
const MAX_ERROR_BODY: usize = 200;

/// HTTP implementation of [`ConversionApi`] plus the remaining endpoints.
#[derive(Clone)]
pub struct HttpApi {
    pub(crate) client: reqwest::Client,
    pub(crate) config: ClientConfig,
    token: Option<String>,
}

impl fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.config.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpApi {
    /// Build a client for `config.base_url`, attaching `token` (if any) as a
    /// bearer token to every request.
    pub fn new(config: &ClientConfig, token: Option<String>) -> Result<Self, Article2AudioError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("article2audio/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Article2AudioError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `GET /audio_files`
    pub async fn list_audio_files(&self) -> Result<Vec<AudioFile>, Article2AudioError> {
        self.get_json("/audio_files").await
    }

    /// `GET /get_feed_url`
    pub async fn feed_url(&self) -> Result<String, Article2AudioError> {
        let r: FeedUrlResponse = self.get_json("/get_feed_url").await?;
        Ok(r.feed_url)
    }

    /// `POST /verify_token`
    ///
    /// Any non-200 answer means the token was not accepted.
    pub async fn verify_token(&self, token: &str) -> Result<VerifiedUser, Article2AudioError> {
        let path = "/verify_token";
        let response = self
            .send(path, self.post(path).json(&VerifyTokenRequest { token }))
            .await?;
        if response.status() != StatusCode::OK {
            return Err(Article2AudioError::Unauthorized {
                endpoint: path.to_string(),
            });
        }
        decode(path, response).await
    }

    // ── Request plumbing ─────────────────────────────────────────────────

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.get_url(self.config.endpoint(path))
    }

    pub(crate) fn get_url(&self, url: String) -> RequestBuilder {
        self.authorise(self.client.get(url))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorise(self.client.post(self.config.endpoint(path)))
    }

    fn authorise(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send with the JSON request timeout and map transport failures.
    pub(crate) async fn send(
        &self,
        path: &str,
        req: RequestBuilder,
    ) -> Result<Response, Article2AudioError> {
        self.send_with_timeout(path, req, self.config.request_timeout_secs)
            .await
    }

    pub(crate) async fn send_with_timeout(
        &self,
        path: &str,
        req: RequestBuilder,
        timeout_secs: u64,
    ) -> Result<Response, Article2AudioError> {
        debug!("→ {}", path);
        req.timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| Article2AudioError::RequestFailed {
                endpoint: path.to_string(),
                reason: if e.is_timeout() {
                    format!("timed out after {timeout_secs}s")
                } else {
                    e.to_string()
                },
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Article2AudioError> {
        let response = self.send(path, self.get(path)).await?;
        decode(path, check_status(path, response).await?).await
    }

    /// `GET {path}/{id}` with `id` as a single encoded segment.
    async fn get_resource_json<T: DeserializeOwned>(
        &self,
        path: &str,
        id: &str,
    ) -> Result<T, Article2AudioError> {
        let label = format!("{path}/{id}");
        let url = self.config.resource(path, id)?;
        let response = self.send(&label, self.get_url(url)).await?;
        decode(&label, check_status(&label, response).await?).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Article2AudioError> {
        let response = self.send(path, self.post(path).json(body)).await?;
        decode(path, check_status(path, response).await?).await
    }
}

#[async_trait]
impl ConversionApi for HttpApi {
    async fn submit(&self, url: &str) -> Result<SubmitResponse, Article2AudioError> {
        self.post_json("/process_article", &SubmitRequest { url })
            .await
    }

    async fn status(&self, task_id: &str) -> Result<StatusResponse, Article2AudioError> {
        self.get_resource_json("/status", task_id).await
    }
}

/// Turn 401/403 into [`Article2AudioError::Unauthorized`] and any other
/// non-2xx into [`Article2AudioError::HttpStatus`] with a trimmed body.
pub(crate) async fn check_status(
    path: &str,
    response: Response,
) -> Result<Response, Article2AudioError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Article2AudioError::Unauthorized {
            endpoint: path.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(Article2AudioError::HttpStatus {
        endpoint: path.to_string(),
        status: status.as_u16(),
        body: error_detail(&body),
    })
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, Article2AudioError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Article2AudioError::RequestFailed {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| Article2AudioError::DecodeFailed {
        endpoint: path.to_string(),
        detail: e.to_string(),
    })
}

/// Prefer the `detail` field of a JSON error body, else the raw text.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    if detail.chars().count() > MAX_ERROR_BODY {
        let cut: String = detail.chars().take(MAX_ERROR_BODY - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        detail
    }
}
