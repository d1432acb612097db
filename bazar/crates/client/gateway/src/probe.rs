use crate::client::HttpClient;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides whether a gateway currently answers.
#[async_trait]
pub trait LivenessProbe: Send + Sync + std::fmt::Debug {
    async fn is_live(&self, url: &str) -> bool;
}

/// `GET {gateway}/info`, live on any 2xx JSON answer within the timeout.
#[derive(Debug, Clone)]
pub struct HttpLivenessProbe {
    client: HttpClient,
    timeout: Duration,
}

impl HttpLivenessProbe {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl LivenessProbe for HttpLivenessProbe {
    async fn is_live(&self, url: &str) -> bool {
        let request = match self.client.request(url).and_then(|r| r.add_uri_segment("info")) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(gateway = url, "Cannot probe gateway: {e}");
                return false;
            }
        };
        match request.with_timeout(self.timeout).accept_json().send_get::<Value>().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(gateway = url, error_type = e.error_type(), "Gateway probe failed: {e}");
                false
            }
        }
    }
}
