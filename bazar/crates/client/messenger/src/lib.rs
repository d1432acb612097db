//! Delivery of signed, tagged messages to processes.
//!
//! Submission is fire-and-forget: [`Messenger::send`] returns as soon as the message unit accepted
//! the message, and is never retried. Waiting for the outcome is the job of the correlator.

mod signer;

pub use signer::{DataItem, SignedDataItem, Signer, SignerError};

use async_trait::async_trait;
use bc_gateway::{HttpClient, TransportError};
use bp_ao::{InvalidMessage, Message, MessageId, Tag};
use serde::Deserialize;

pub const DEFAULT_MU_URL: &str = "https://mu.ao-testnet.xyz";

const PROTOCOL_TAGS: &[(&str, &str)] = &[("Data-Protocol", "ao"), ("Variant", "ao.TN.1"), ("Type", "Message")];

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("Invalid message: {0}")]
    Invalid(#[from] InvalidMessage),
    #[error("Signing failed: {0}")]
    Signer(#[from] SignerError),
    #[error("Message submission failed: {0:#}")]
    Submit(#[from] TransportError),
}

impl MessengerError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Submit(e) if e.is_rate_limited())
    }
}

#[async_trait]
pub trait Messenger: Send + Sync + std::fmt::Debug {
    /// Signs and submits `message`, returning its id without waiting for it to be processed.
    async fn send(&self, message: Message, signer: &dyn Signer) -> Result<MessageId, MessengerError>;
}

#[derive(Debug, Clone)]
pub struct MessengerConfig {
    pub mu_url: String,
    /// Value of the `SDK` tag identifying this client.
    pub sdk: String,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self { mu_url: DEFAULT_MU_URL.to_string(), sdk: "bazar".to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Submits signed data items to a message unit over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMessenger {
    http: HttpClient,
    config: MessengerConfig,
}

impl HttpMessenger {
    pub fn new(http: HttpClient, config: MessengerConfig) -> Self {
        Self { http, config }
    }

    /// Caller tags behind `Action`, then the protocol tags.
    pub fn data_item(&self, message: &Message) -> DataItem {
        let mut tags = message.all_tags();
        tags.extend(PROTOCOL_TAGS.iter().map(|(name, value)| Tag::new(*name, *value)));
        tags.push(Tag::new("SDK", self.config.sdk.clone()));
        DataItem { target: message.target.clone(), anchor: None, tags, data: message.data.clone().into_bytes() }
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    #[tracing::instrument(skip(self, message, signer), fields(process_id = %message.target, action = %message.action))]
    async fn send(&self, message: Message, signer: &dyn Signer) -> Result<MessageId, MessengerError> {
        message.validate()?;

        let item = self.data_item(&message);
        let signed = signer.sign(&item).await?;
        tracing::debug!(message_id = %signed.id, bytes = signed.raw.len(), "Submitting signed message");

        let response: SubmitResponse =
            self.http.request(&self.config.mu_url)?.send_post_bytes(signed.raw, "application/octet-stream").await?;

        let message_id = response.id.unwrap_or(signed.id);
        tracing::info!(message_id = %message_id, "Message submitted");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bp_ao::TagsExt;
    use httpmock::prelude::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    const PID: &str = "Ge1Av2LDmbhJLv2luakYS2jPTZ1KFls4VXudFCAdDAM";

    #[derive(Debug)]
    struct FakeSigner {
        fail: bool,
    }

    #[async_trait]
    impl Signer for FakeSigner {
        async fn sign(&self, item: &DataItem) -> Result<SignedDataItem, SignerError> {
            if self.fail {
                return Err(SignerError::Rejected("user cancelled".into()));
            }
            let raw = serde_json::to_vec(&json!({
                "target": item.target.as_str(),
                "tags": item.tags,
            }))
            .unwrap();
            Ok(SignedDataItem { id: "local-id".into(), raw })
        }
    }

    #[fixture]
    fn server() -> MockServer {
        MockServer::start()
    }

    fn messenger(server: &MockServer) -> HttpMessenger {
        HttpMessenger::new(HttpClient::default(), MessengerConfig { mu_url: server.base_url(), ..Default::default() })
    }

    fn transfer() -> Message {
        Message::new(PID.parse().unwrap(), "Transfer").with_tag("Recipient", "someone").with_tag("Quantity", "1")
    }

    #[test]
    fn data_item_carries_protocol_tags() {
        let messenger = HttpMessenger::new(HttpClient::default(), MessengerConfig::default());
        let item = messenger.data_item(&transfer());
        assert_eq!(item.tags[0], Tag::new("Action", "Transfer"));
        assert_eq!(item.tags.get_tag("Data-Protocol"), Some("ao"));
        assert_eq!(item.tags.get_tag("Variant"), Some("ao.TN.1"));
        assert_eq!(item.tags.get_tag("Type"), Some("Message"));
        assert_eq!(item.tags.get_tag("SDK"), Some("bazar"));
        assert_eq!(item.tags.get_tag("Quantity"), Some("1"));
    }

    #[rstest]
    #[tokio::test]
    async fn send_returns_message_unit_id(server: MockServer) {
        let mock = server.mock(|when, then| {
            when.method(POST).path("/").header("content-type", "application/octet-stream").body_contains("Transfer");
            then.status(202).json_body(json!({ "message": "Processing DataItem", "id": "mu-id" }));
        });

        let id = messenger(&server).send(transfer(), &FakeSigner { fail: false }).await.unwrap();
        mock.assert();
        assert_eq!(id, "mu-id");
    }

    #[rstest]
    #[tokio::test]
    async fn falls_back_to_signed_id(server: MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(200).json_body(json!({}));
        });
        let id = messenger(&server).send(transfer(), &FakeSigner { fail: false }).await.unwrap();
        assert_eq!(id, "local-id");
    }

    #[rstest]
    #[tokio::test]
    async fn rate_limit_is_not_retried(server: MockServer) {
        let mock = server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(429);
        });

        let err = messenger(&server).send(transfer(), &FakeSigner { fail: false }).await.unwrap_err();
        assert!(err.is_rate_limited());
        mock.assert_hits(1);
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_message_and_signer_failures_never_submit(server: MockServer) {
        let mock = server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(200).json_body(json!({ "id": "x" }));
        });
        let messenger = messenger(&server);

        let empty_action = Message::new(PID.parse().unwrap(), "");
        assert_matches!(
            messenger.send(empty_action, &FakeSigner { fail: false }).await,
            Err(MessengerError::Invalid(InvalidMessage::EmptyAction))
        );
        assert_matches!(
            messenger.send(transfer(), &FakeSigner { fail: true }).await,
            Err(MessengerError::Signer(SignerError::Rejected(_)))
        );
        mock.assert_hits(0);
    }
}
