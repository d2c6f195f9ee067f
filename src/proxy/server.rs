//! Credential-injecting HTTP gateway in front of the upstream API.
//!
//! The browser never holds upstream connectivity concerns: it calls
//! `/api/{path}` same-origin, the gateway checks the path against the
//! allow-list, rebuilds the Basic auth header, and forwards the upstream
//! status and body verbatim. It translates nothing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::config::ProxyConfig;
use crate::models::validate_webhook_payload;

use super::AllowList;

/// Upstream request timeout in seconds.
const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Minimum plausible API key length; anything shorter is rejected before it
/// ever reaches upstream.
const MIN_API_KEY_LENGTH: usize = 20;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct ProxyState {
    allow_list: Arc<AllowList>,
    upstream: reqwest::Client,
    base_url: Arc<String>,
}

/// Build the gateway router with tracing and permissive CORS.
pub fn build_router(config: &ProxyConfig) -> Result<Router> {
    let upstream = reqwest::Client::builder()
        .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
        .build()
        .context("Failed to build upstream HTTP client")?;

    let state = ProxyState {
        allow_list: Arc::new(AllowList::new()),
        upstream,
        base_url: Arc::new(config.upstream_base_url.trim_end_matches('/').to_string()),
    };

    Ok(Router::new()
        .route("/health", get(health))
        .route("/api/*path", any(forward))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state))
}

/// Bind and serve until ctrl-c or SIGTERM.
pub async fn serve(config: ProxyConfig) -> Result<()> {
    let app = build_router(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Proxy gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Proxy server error")?;

    info!("Proxy gateway shut down gracefully");
    Ok(())
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn forward(
    State(state): State<ProxyState>,
    method: Method,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.allow_list.is_allowed(&path) {
        return error_response(StatusCode::FORBIDDEN, "Path not allowed");
    }

    let Some(api_key) = extract_api_key(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "API key required");
    };
    if !plausible_api_key(&api_key) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid API key format");
    }

    let mut outbound_body = None;
    if (method == Method::POST || method == Method::PUT) && !body.is_empty() {
        let parsed: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON in request body"),
        };

        if method == Method::POST && path.contains("/webhooks") {
            let violations = validate_webhook_payload(&parsed);
            if !violations.is_empty() {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Validation failed: {}", violations.join(", ")),
                );
            }
        }
        outbound_body = Some(body);
    }

    let url = format!("{}/{}", state.base_url, path);
    let encoded = BASE64.encode(format!("{api_key}:x"));
    let mut request = state
        .upstream
        .request(method.clone(), &url)
        .header(header::ACCEPT, "application/json")
        .header(header::AUTHORIZATION, format!("Basic {encoded}"))
        .header(
            header::USER_AGENT,
            concat!("hookcache-proxy/", env!("CARGO_PKG_VERSION")),
        );
    if let Some(bytes) = outbound_body {
        request = request
            .header(header::CONTENT_TYPE, "application/json")
            .body(bytes);
    }

    match request.send().await {
        Ok(upstream) => {
            let status = upstream.status();
            let bytes = upstream.bytes().await.unwrap_or_default();
            debug!(%method, %path, status = status.as_u16(), "Forwarded upstream response");
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!(%method, %path, error = %e, "Upstream request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Pull the API key out of Basic auth (key as username) or a Bearer token.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if let Some(encoded) = value.strip_prefix("Basic ") {
        let decoded = BASE64.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        Some(decoded.split(':').next().unwrap_or("").to_string())
    } else {
        value.strip_prefix("Bearer ").map(|token| token.trim().to_string())
    }
}

fn plausible_api_key(key: &str) -> bool {
    key.len() >= MIN_API_KEY_LENGTH
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// Graceful shutdown on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
