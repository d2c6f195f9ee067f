use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::auth::Session;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Wait applied when a 429 response carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Transport adapter for the upstream REST API.
///
/// Injects Basic auth from the shared session on every request, re-issues
/// rate-limited requests after the server-supplied delay, and converts the
/// upstream 401 into a session teardown. Each 429 buys exactly one re-issue
/// with no bound at this layer - bounding attempts is the caller's job.
///
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the session is shared.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Issue a request and parse the JSON response body. Empty bodies (the
    /// upstream DELETE success case) come back as `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let response = self.send_raw(method, path, body, cancel).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::DataShape(format!("{path}: invalid JSON body: {e}")))
    }

    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let mut request = self.client.request(method.clone(), &url);
            if let Some(api_key) = self.session.api_key() {
                let encoded = BASE64.encode(format!("{api_key}:x"));
                request = request.header(header::AUTHORIZATION, format!("Basic {encoded}"));
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                result = request.send() => result?,
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after_secs(&response);
                warn!(path, wait_secs = wait, "Rate limited, waiting before re-issuing");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                }
                continue;
            }

            let body_text = response.text().await.unwrap_or_default();

            if status == StatusCode::UNAUTHORIZED {
                warn!(path, "Upstream rejected credentials - clearing session");
                self.session.clear_credentials();
                return Err(ApiError::Auth);
            }

            return Err(ApiError::from_status(status, &body_text));
        }
    }
}

fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
