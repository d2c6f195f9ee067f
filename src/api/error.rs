use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("unauthorized - API key rejected")]
    Auth,

    #[error("access denied: {0}")]
    NotAllowed(String),

    #[error("rate limited - please wait before retrying")]
    RateLimited,

    #[error("request timed out upstream")]
    Timeout,

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    DataShape(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("webhook was deleted but the replacement could not be created: {source}")]
    UpdateLost {
        #[source]
        source: Box<ApiError>,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Auth,
            403 => ApiError::NotAllowed(truncated),
            408 => ApiError::Timeout,
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server {
                status: status.as_u16(),
                body: truncated,
            },
            _ => ApiError::Upstream {
                status: status.as_u16(),
                body: truncated,
            },
        }
    }

    /// Whether another attempt could plausibly succeed: transient upstream
    /// conditions, plus payloads that failed structural validation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_)
                | ApiError::Server { .. }
                | ApiError::RateLimited
                | ApiError::Timeout
                | ApiError::DataShape(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}
