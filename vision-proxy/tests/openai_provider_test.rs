//! Tests for the OpenAI provider against a local stub of the upstream API.
//!
//! Run with: cargo test -p vision-proxy --test openai_provider_test

mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use common::{completion_body, test_config, TestDirs, TEST_API_KEY};
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use vision_proxy::models::{ImageAttachment, ImageType};
use vision_proxy::services::providers::openai::{OpenAiConfig, OpenAiProvider};
use vision_proxy::services::providers::{ChatProvider, ProviderError};
use vision_proxy::startup::Application;

/// What the stub saw: Authorization header and JSON body.
type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

#[derive(Clone)]
struct StubState {
    captured: Captured,
    status: StatusCode,
    body: Value,
    delay: Duration,
}

async fn stub_completions(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.captured.lock().unwrap().push((auth, payload));

    tokio::time::sleep(state.delay).await;
    (state.status, Json(state.body))
}

/// Start a stub upstream and return its base URL and capture log.
async fn spawn_stub(status: StatusCode, body: Value, delay: Duration) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        captured: captured.clone(),
        status,
        body,
        delay,
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(stub_completions))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://127.0.0.1:{}/v1", port), captured)
}

fn provider(base_url: &str, timeout: Duration) -> OpenAiProvider {
    OpenAiProvider::new(OpenAiConfig {
        api_key: Secret::new(TEST_API_KEY.to_string()),
        base_url: base_url.to_string(),
        model: "gpt-4o".to_string(),
        max_tokens: 1000,
        timeout,
    })
    .expect("Failed to build provider")
}

#[tokio::test]
async fn sends_bearer_credential_and_payload() {
    let (base_url, captured) =
        spawn_stub(StatusCode::OK, completion_body(), Duration::ZERO).await;
    let provider = provider(&base_url, Duration::from_secs(5));
    let image = ImageAttachment::from_bytes(ImageType::Jpeg, &common::fake_jpeg(64));

    let body = provider
        .submit("What is this?", Some(&image))
        .await
        .expect("Upstream call failed");

    assert_eq!(body, completion_body());

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let (auth, payload) = &captured[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test-not-a-real-key"));
    assert_eq!(payload["model"], "gpt-4o");
    assert_eq!(payload["max_tokens"], 1000);
    assert_eq!(payload["messages"].as_array().unwrap().len(), 1);

    let content = &payload["messages"][0]["content"];
    assert_eq!(content[0], json!({ "type": "text", "text": "What is this?" }));
    assert_eq!(content[1]["type"], "image_url");
    assert!(content[1]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn error_status_surfaces_upstream_message() {
    let (base_url, _) = spawn_stub(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" } }),
        Duration::ZERO,
    )
    .await;

    let err = provider(&base_url, Duration::from_secs(5))
        .submit("hi", None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::Api {
            status: 401,
            message: "Incorrect API key provided".to_string()
        }
    );
}

#[tokio::test]
async fn error_without_message_falls_back_to_status() {
    let (base_url, _) = spawn_stub(
        StatusCode::BAD_GATEWAY,
        json!({ "detail": "upstream unavailable" }),
        Duration::ZERO,
    )
    .await;

    let err = provider(&base_url, Duration::from_secs(5))
        .submit("hi", None)
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 502);
            assert!(message.starts_with("Upstream API returned 502"));
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let (base_url, _) =
        spawn_stub(StatusCode::OK, completion_body(), Duration::from_secs(5)).await;

    let err = provider(&base_url, Duration::from_millis(300))
        .submit("hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Timeout(_)));
}

#[tokio::test]
async fn unreachable_upstream_is_network_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = provider(&format!("http://127.0.0.1:{}/v1", port), Duration::from_secs(5))
        .submit("hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Network(_)));
}

#[tokio::test]
async fn full_stack_failure_returns_500_with_message() {
    let (base_url, _) = spawn_stub(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "message": "Rate limit reached for gpt-4o" } }),
        Duration::ZERO,
    )
    .await;

    let dirs = TestDirs::new();
    let app = Application::build(test_config(&dirs, &base_url))
        .await
        .expect("Failed to build application");
    let port = app.port();
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    let image = reqwest::multipart::Part::bytes(common::fake_jpeg(4096))
        .file_name("photo.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new()
        .text("prompt", "Describe this photo")
        .part("image", image);

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/api/openai", port))
        .multipart(form)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "error": "Internal Server Error",
            "message": "Rate limit reached for gpt-4o"
        })
    );
    assert!(dirs.uploads_empty());
}
