//! `HttpApi` against a local axum server speaking the service's wire format.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use article2audio::{
    convert, sign_in, Article2AudioError, ClientConfig, ConversionApi, HttpApi, Phase, TokenStore,
};

const GOOD_TOKEN: &str = "good-token";
const AUDIO: &[u8] = b"ID3\x04\x00fake-mp3-payload";

#[derive(Clone, Default)]
struct Service {
    polls: Arc<AtomicUsize>,
    last_auth: Arc<Mutex<Option<String>>>,
}

impl Service {
    fn remember_auth(&self, headers: &HeaderMap) -> bool {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let ok = auth.as_deref() == Some(&format!("Bearer {GOOD_TOKEN}"));
        *self.last_auth.lock().unwrap() = auth;
        ok
    }
}

async fn process_article(
    State(svc): State<Service>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    // Anonymous submissions are allowed; a token, once sent, must be valid.
    if !svc.remember_auth(&headers) && headers.contains_key(header::AUTHORIZATION) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid token" })),
        );
    }
    let url = body["url"].as_str().unwrap_or_default();
    if url.contains("empty") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "No content found at the provided URL." })),
        );
    }
    // The service reports a fractional estimate.
    (
        StatusCode::OK,
        Json(json!({ "task_id": "abc", "estimated_time": 29.7 })),
    )
}

async fn status(State(svc): State<Service>, Path(task_id): Path<String>) -> impl IntoResponse {
    if task_id != "abc" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Task not found" })),
        );
    }
    let n = svc.polls.fetch_add(1, Ordering::SeqCst);
    let status = match n {
        0 => "scraping_url",
        1 => "Creating audio file...",
        _ => "completed",
    };
    (StatusCode::OK, Json(json!({ "status": status })))
}

async fn audio_files(State(svc): State<Service>, headers: HeaderMap) -> impl IntoResponse {
    if !svc.remember_auth(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid token" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!([
            { "id": 1, "file_name": "older.mp3", "creation_date": "2024-03-01T08:00:00" },
            { "id": 2, "file_name": "newer.mp3", "creation_date": "2024-03-02T09:30:00.123456" },
        ])),
    )
}

async fn download(
    State(svc): State<Service>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> axum::response::Response {
    if !svc.remember_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match id.as_str() {
        "2" => (
            [
                (header::CONTENT_TYPE, "audio/mpeg"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"Why Rust - Jane Doe.mp3\"",
                ),
            ],
            AUDIO,
        )
            .into_response(),
        "3" => ([(header::CONTENT_TYPE, "audio/mpeg")], AUDIO).into_response(),
        "4" => (
            [(
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"../../etc/passwd\"",
            )],
            AUDIO,
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "File not found" })),
        )
            .into_response(),
    }
}

async fn feed_url(State(svc): State<Service>, headers: HeaderMap) -> impl IntoResponse {
    if !svc.remember_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "feed_url": "http://localhost:8001/api/rss/user-1.xml" })).into_response()
}

async fn verify_token(Json(body): Json<Value>) -> impl IntoResponse {
    if body["token"].as_str() == Some(GOOD_TOKEN) {
        (
            StatusCode::OK,
            Json(json!({ "userid": "user-1", "email": "reader@example.com" })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid token" })),
        )
    }
}

async fn start_server() -> (SocketAddr, Service, tokio::task::JoinHandle<()>) {
    let svc = Service::default();
    let app = Router::new()
        .route("/api/process_article", post(process_article))
        .route("/api/status/:task_id", get(status))
        .route("/api/audio_files", get(audio_files))
        .route("/api/download/:id", get(download))
        .route("/api/get_feed_url", get(feed_url))
        .route("/api/verify_token", post(verify_token))
        .with_state(svc.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, svc, handle)
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::builder()
        .base_url(format!("http://{addr}/api/"))
        .poll_interval_ms(20)
        .countdown_tick_ms(5)
        .build()
        .unwrap()
}

#[tokio::test]
async fn submit_sends_bearer_token_and_rounds_estimate() {
    let (addr, svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();

    let accepted = api.submit("https://example.com/post").await.unwrap();
    assert_eq!(accepted.task_id, "abc");
    assert_eq!(accepted.estimated_time, 30);
    assert_eq!(
        svc.last_auth.lock().unwrap().as_deref(),
        Some("Bearer good-token")
    );
}

#[tokio::test]
async fn requests_without_token_carry_no_authorization() {
    let (addr, svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), None).unwrap();
    api.submit("https://example.com/post").await.unwrap();
    assert!(svc.last_auth.lock().unwrap().is_none());
}

#[tokio::test]
async fn rejected_submission_carries_service_detail() {
    let (addr, _svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), None).unwrap();

    let err = api.submit("https://example.com/empty").await.unwrap_err();
    match err {
        Article2AudioError::HttpStatus { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "No content found at the provided URL.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_task_is_a_permanent_error() {
    let (addr, _svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), None).unwrap();

    let err = api.status("nope").await.unwrap_err();
    assert!(matches!(err, Article2AudioError::HttpStatus { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn status_strings_pass_through_verbatim() {
    let (addr, _svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), None).unwrap();
    assert_eq!(api.status("abc").await.unwrap().status, "scraping_url");
    assert_eq!(api.status("abc").await.unwrap().status, "Creating audio file...");
    assert_eq!(api.status("abc").await.unwrap().status, "completed");
}

#[tokio::test]
async fn task_id_is_sent_as_one_path_segment() {
    let (addr, svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), None).unwrap();

    for odd in ["abc?x=1", "abc#frag", "a/b"] {
        let err = api.status(odd).await.unwrap_err();
        match err {
            Article2AudioError::HttpStatus { status, body, .. } => {
                assert_eq!(status, 404, "{odd}");
                assert_eq!(body, "Task not found", "{odd}");
            }
            other => panic!("{odd}: unexpected error: {other:?}"),
        }
    }
    // None of them reached the real job.
    assert_eq!(svc.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_service_is_transient() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let api = HttpApi::new(&config(addr), None).unwrap();
    let err = api.status("abc").await.unwrap_err();
    assert!(matches!(err, Article2AudioError::RequestFailed { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn audio_files_require_a_valid_token() {
    let (addr, _svc, _handle) = start_server().await;

    let anonymous = HttpApi::new(&config(addr), Some("stale".into())).unwrap();
    let err = anonymous.list_audio_files().await.unwrap_err();
    assert!(matches!(err, Article2AudioError::Unauthorized { .. }));

    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();
    let files = api.list_audio_files().await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id, "1");
    assert_eq!(files[1].file_name, "newer.mp3");
    assert!(files[1].created_at() > files[0].created_at());
}

#[tokio::test]
async fn download_uses_content_disposition_name() {
    let (addr, _svc, _handle) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = {
        let seen = Arc::clone(&seen);
        move |done: u64, total: Option<u64>| seen.lock().unwrap().push((done, total))
    };
    let path = api.download("2", dir.path(), Some(&record)).await.unwrap();

    assert_eq!(path, dir.path().join("Why Rust - Jane Doe.mp3"));
    assert_eq!(std::fs::read(&path).unwrap(), AUDIO);
    let last = *seen.lock().unwrap().last().unwrap();
    assert_eq!(last, (AUDIO.len() as u64, Some(AUDIO.len() as u64)));

    // No temporary file left behind.
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[tokio::test]
async fn download_falls_back_to_id_name_and_strips_paths() {
    let (addr, _svc, _handle) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();

    let path = api.download("3", dir.path(), None).await.unwrap();
    assert_eq!(path, dir.path().join("audio-3.mp3"));

    let path = api.download("4", dir.path(), None).await.unwrap();
    assert_eq!(path, dir.path().join("passwd"));
}

#[tokio::test]
async fn failed_rename_leaves_no_partial_file() {
    let (addr, _svc, _handle) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();

    // A directory already holds the target name.
    std::fs::create_dir(dir.path().join("Why Rust - Jane Doe.mp3")).unwrap();

    let err = api.download("2", dir.path(), None).await.unwrap_err();
    assert!(matches!(err, Article2AudioError::OutputWriteFailed { .. }), "{err:?}");

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["Why Rust - Jane Doe.mp3".to_string()]);
}

#[tokio::test]
async fn missing_download_writes_nothing() {
    let (addr, _svc, _handle) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();

    let err = api.download("99", dir.path(), None).await.unwrap_err();
    assert!(matches!(err, Article2AudioError::HttpStatus { status: 404, .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn feed_url_is_returned() {
    let (addr, _svc, _handle) = start_server().await;
    let api = HttpApi::new(&config(addr), Some(GOOD_TOKEN.into())).unwrap();
    assert_eq!(
        api.feed_url().await.unwrap(),
        "http://localhost:8001/api/rss/user-1.xml"
    );
}

#[tokio::test]
async fn sign_in_stores_verified_token_and_clears_rejected_one() {
    let (addr, _svc, _handle) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::load(dir.path().join("token")).unwrap();
    let cfg = config(addr);

    let user = sign_in(&cfg, &store, GOOD_TOKEN).await.unwrap();
    assert_eq!(user.userid, "user-1");
    assert_eq!(user.email.as_deref(), Some("reader@example.com"));
    assert_eq!(store.current().as_deref(), Some(GOOD_TOKEN));

    let err = sign_in(&cfg, &store, "forged").await.unwrap_err();
    assert!(matches!(err, Article2AudioError::Unauthorized { .. }));
    assert!(!store.is_signed_in());
    assert!(!dir.path().join("token").exists());
}

#[tokio::test]
async fn convert_follows_job_to_completion() {
    let (addr, svc, _handle) = start_server().await;

    let outcome = convert("https://example.com/post", &config(addr), None)
        .await
        .unwrap();
    assert_eq!(outcome.task_id, "abc");
    assert_eq!(outcome.phase, Phase::Completed);
    assert_eq!(outcome.estimated_secs, 30);
    assert_eq!(outcome.polls, 3);
    assert_eq!(svc.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn convert_reports_rejected_submission() {
    let (addr, svc, _handle) = start_server().await;

    let err = convert("https://example.com/empty", &config(addr), None)
        .await
        .unwrap_err();
    match err {
        Article2AudioError::SubmissionFailed {
            url,
            detail,
            unauthorized,
        } => {
            assert_eq!(url, "https://example.com/empty");
            assert!(detail.contains("No content found"), "{detail}");
            assert!(!unauthorized);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(svc.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn convert_flags_a_rejected_token() {
    let (addr, svc, _handle) = start_server().await;

    let err = convert("https://example.com/post", &config(addr), Some("stale".into()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, Article2AudioError::SubmissionFailed { unauthorized: true, .. }),
        "{err:?}"
    );
    assert!(err.is_unauthorized());
    assert_eq!(svc.polls.load(Ordering::SeqCst), 0);
}
