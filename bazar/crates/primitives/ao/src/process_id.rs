use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Length of a base64url encoded 32 byte identifier.
pub const PROCESS_ID_LEN: usize = 43;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProcessIdError {
    #[error("Process id must be {PROCESS_ID_LEN} characters, got {0}")]
    InvalidLength(usize),
    #[error("Process id is not valid base64url: {0}")]
    InvalidEncoding(String),
}

/// Identifier of a process (or of a message, which uses the same encoding).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessId(String);

impl ProcessId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProcessId {
    type Err = ProcessIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != PROCESS_ID_LEN {
            return Err(ProcessIdError::InvalidLength(s.len()));
        }
        URL_SAFE_NO_PAD.decode(s).map_err(|e| ProcessIdError::InvalidEncoding(e.to_string()))?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ProcessId {
    type Error = ProcessIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProcessId> for String {
    fn from(value: ProcessId) -> Self {
        value.0
    }
}

impl AsRef<str> for ProcessId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
