use async_trait::async_trait;
use bp_ao::{ProcessId, Tag};
use serde::Serialize;

/// An unsigned message envelope, handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataItem {
    pub target: ProcessId,
    pub anchor: Option<String>,
    pub tags: Vec<Tag>,
    pub data: Vec<u8>,
}

/// Wire bytes of a signed data item and the id derived from its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataItem {
    pub id: String,
    pub raw: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("No wallet is connected")]
    Unavailable,
    #[error("Signature rejected: {0}")]
    Rejected(String),
}

/// Wallet-side signing. Key material never leaves the implementor.
#[async_trait]
pub trait Signer: Send + Sync + std::fmt::Debug {
    async fn sign(&self, item: &DataItem) -> Result<SignedDataItem, SignerError>;
}
