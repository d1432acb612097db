use bp_resilience::{RetryClass, Retryable};
use http::StatusCode;
use std::time::Duration;

const RATE_LIMIT_MARKERS: &[&str] = &["too many requests", "rate limit"];

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Rate limited by {url}")]
    RateLimited { url: String, retry_after: Option<Duration> },
    #[error("Not found: {url}")]
    NotFound { url: String },
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("HTTP status {status} from {url}: {body}")]
    Status { url: String, status: StatusCode, body: String },
    #[error("Error calling HTTP client: {0:#}")]
    HttpCallError(#[source] reqwest::Error),
    #[error("Error deserializing response: {serde_error:#}")]
    DeserializeBody { serde_error: serde_json::Error },
    #[error("Error serializing request: {0:#}")]
    SerializeRequest(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout { url: url.to_string() }
        } else {
            Self::HttpCallError(error)
        }
    }

    /// Some upstreams answer rate limiting with a 5xx and a plain text body.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Status { body, .. } => {
                let body = body.to_lowercase();
                RATE_LIMIT_MARKERS.iter().any(|marker| body.contains(marker))
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Network level failures: the request may succeed against another node.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::HttpCallError(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            _ => self.is_rate_limited(),
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            _ if self.is_rate_limited() => "rate_limited",
            Self::NotFound { .. } => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::HttpCallError(_) => "network",
            Self::DeserializeBody { .. } => "deserialize",
            Self::SerializeRequest(_) => "serialize",
            Self::InvalidUrl(_) => "invalid_url",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

impl Retryable for TransportError {
    fn retry_class(&self) -> RetryClass {
        if self.is_rate_limited() {
            RetryClass::RateLimited
        } else if self.is_not_found() {
            RetryClass::Pending
        } else {
            RetryClass::Fatal
        }
    }
}
