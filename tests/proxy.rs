//! Completion proxy served on an ephemeral port.

use docscan::server::{router, ProxyState};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn spawn_proxy(state: ProxyState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

fn payload() -> Value {
    json!({
        "model": "gpt-4o-mini",
        "messages": [{ "role": "user", "content": "hello" }],
        "temperature": 0.3,
        "max_tokens": 50
    })
}

#[tokio::test]
async fn forwards_with_bearer_key() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = ProxyState::new(
        &format!("{}/v1/chat/completions", upstream.uri()),
        Some("test-key".to_string()),
        "DOCSCAN_TEST_KEY",
    )
    .unwrap();
    let base = spawn_proxy(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn relays_upstream_errors_unchanged() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached" }
        })))
        .mount(&upstream)
        .await;

    let state = ProxyState::new(&upstream.uri(), Some("test-key".to_string()), "K").unwrap();
    let base = spawn_proxy(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Rate limit reached");
}

#[tokio::test]
async fn missing_key_is_a_server_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let state = ProxyState::new(&upstream.uri(), None, "DOCSCAN_TEST_KEY").unwrap();
    let base = spawn_proxy(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"],
        "API key is not configured: set DOCSCAN_TEST_KEY"
    );
}

#[tokio::test]
async fn blank_key_counts_as_missing() {
    let state = ProxyState::new("http://127.0.0.1:9/", Some("  ".to_string()), "K").unwrap();
    let base = spawn_proxy(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    // Bind then drop a listener to get a port nothing is serving.
    let closed = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };
    let state = ProxyState::new(
        &format!("http://{}/v1/chat/completions", closed),
        Some("test-key".to_string()),
        "K",
    )
    .unwrap();
    let base = spawn_proxy(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_version() {
    let state = ProxyState::new("http://127.0.0.1:9/", None, "K").unwrap();
    let base = spawn_proxy(state).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
