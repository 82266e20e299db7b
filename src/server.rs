//! Chat-completion proxy.
//!
//! Keeps the provider API key out of every client: analysis and chat requests
//! are posted here and forwarded upstream with the key attached.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Forward a chat-completion payload, relay status and body |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Proxy-side failures are JSON with a single message:
//!
//! ```json
//! { "error": "API key is not configured: set OPENAI_API_KEY" }
//! ```
//!
//! A missing key is `500`; an upstream that cannot be reached is `502`.
//! Upstream errors are relayed unchanged with the upstream status.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end can
//! call the proxy directly.

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ProxyConfig;

const UPSTREAM_TIMEOUT_SECS: u64 = 120;

/// Shared state passed to the handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream_url: Arc<str>,
    /// Resolved once at startup; `None` makes every chat call fail with 500.
    api_key: Option<Arc<str>>,
    key_source: Arc<str>,
}

impl ProxyState {
    pub fn new(
        upstream_url: &str,
        api_key: Option<String>,
        key_source: &str,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            upstream_url: upstream_url.into(),
            api_key: api_key
                .filter(|k| !key_is_missing(Some(k)))
                .map(Into::into),
            key_source: key_source.into(),
        })
    }

    /// Read the key from the environment variable named in the config.
    pub fn from_config(config: &ProxyConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if key_is_missing(api_key.as_deref()) {
            tracing::warn!(var = %config.api_key_env, "API key is not set; chat requests will fail");
        }
        Self::new(&config.upstream_url, api_key, &config.api_key_env)
    }
}

fn key_is_missing(key: Option<&str>) -> bool {
    key.map_or(true, |k| k.trim().is_empty())
}

pub fn router(state: ProxyState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind `proxy.bind` and serve until the process is terminated.
pub async fn run_proxy(config: &ProxyConfig) -> anyhow::Result<()> {
    let state = ProxyState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    println!("Completion proxy listening on http://{}", config.bind);
    println!("  POST /api/chat -> {}", config.upstream_url);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ProxyError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<ProxyState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, ProxyError> {
    let api_key = state.api_key.as_deref().ok_or_else(|| ProxyError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("API key is not configured: set {}", state.key_source),
    })?;

    let upstream = state
        .client
        .post(&*state.upstream_url)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "upstream request failed");
            ProxyError {
                status: StatusCode::BAD_GATEWAY,
                message: e.to_string(),
            }
        })?;

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = upstream.bytes().await.map_err(|e| ProxyError {
        status: StatusCode::BAD_GATEWAY,
        message: e.to_string(),
    })?;

    if status.is_success() {
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "upstream responded");
    } else {
        tracing::warn!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(&body),
            "upstream returned an error"
        );
    }

    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_missing() {
        assert!(key_is_missing(None));
        assert!(key_is_missing(Some("")));
        assert!(key_is_missing(Some("  \t")));
        assert!(!key_is_missing(Some("sk-test")));
    }

    #[test]
    fn from_config_drops_a_blank_key() {
        let var = "DOCSCAN_BLANK_KEY_FOR_TEST";
        std::env::set_var(var, "   ");
        let config = ProxyConfig {
            api_key_env: var.to_string(),
            ..ProxyConfig::default()
        };
        let state = ProxyState::from_config(&config).unwrap();
        std::env::remove_var(var);
        assert!(state.api_key.is_none());
        assert_eq!(&*state.key_source, var);
    }
}
