use crate::process_id::ProcessId;
use crate::tag::{Tag, TagsExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub type MessageId = String;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidMessage {
    #[error("Message action cannot be empty")]
    EmptyAction,
    #[error("Tag at position {0} has an empty name")]
    EmptyTagName(usize),
}

/// A message to a process, built once per user operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub target: ProcessId,
    pub action: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub data: String,
}

impl Message {
    pub fn new(target: ProcessId, action: impl Into<String>) -> Self {
        Self { target, action: action.into(), tags: Vec::new(), data: String::new() }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn validate(&self) -> Result<(), InvalidMessage> {
        if self.action.trim().is_empty() {
            return Err(InvalidMessage::EmptyAction);
        }
        if let Some(index) = self.tags.iter().position(|tag| tag.name.trim().is_empty()) {
            return Err(InvalidMessage::EmptyTagName(index));
        }
        Ok(())
    }

    /// `Action` first, then the caller tags in order.
    pub fn all_tags(&self) -> Vec<Tag> {
        std::iter::once(Tag::new("Action", self.action.clone())).chain(self.tags.iter().cloned()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResponse {
    pub fn from_outbox(message: &OutboxMessage) -> Self {
        Self {
            status: message.tags.get_tag("Status").unwrap_or("Success").to_string(),
            message: message.tags.get_tag("Message").map(str::to_string),
            data: message.data_json(),
        }
    }
}

/// Responses to one sent message, keyed by the action of each response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResult {
    pub message_id: MessageId,
    pub responses: BTreeMap<String, ActionResponse>,
}

impl MessageResult {
    pub fn new(message_id: MessageId) -> Self {
        Self { message_id, responses: BTreeMap::new() }
    }

    pub fn covers(&self, expected: &BTreeSet<String>) -> bool {
        expected.iter().all(|action| self.responses.contains_key(action))
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// A message emitted by a process while handling an input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutboxMessage {
    #[serde(rename = "Tags", default)]
    pub tags: Vec<Tag>,
    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "Target", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl OutboxMessage {
    pub fn action(&self) -> Option<&str> {
        self.tags.get_tag("Action")
    }

    /// `Data` parsed as JSON when it is JSON text, kept as-is otherwise.
    pub fn data_json(&self) -> Option<Value> {
        match &self.data {
            None => None,
            Some(Value::String(text)) if text.is_empty() => None,
            Some(Value::String(text)) => Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))),
            Some(other) => Some(other.clone()),
        }
    }
}

/// Outcome of evaluating one message, as reported by a compute unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultEntry {
    #[serde(rename = "Messages", default)]
    pub messages: Vec<OutboxMessage>,
    #[serde(rename = "Output", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEdge {
    #[serde(default)]
    pub cursor: Option<String>,
    pub node: ResultEntry,
}

/// Page of the result log, most recent first when requested with `sort=DESC`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultsPage {
    #[serde(default)]
    pub edges: Vec<ResultEdge>,
}

/// Body of a simulated execution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DryRunRequest {
    pub id: String,
    pub target: ProcessId,
    pub owner: String,
    #[serde(default)]
    pub anchor: String,
    #[serde(default)]
    pub data: String,
    pub tags: Vec<Tag>,
}

impl DryRunRequest {
    /// Dry runs are unsigned, the id and owner only need to be well formed.
    pub const PLACEHOLDER: &'static str = "1234";

    pub fn new(target: ProcessId, tags: Vec<Tag>, data: String, owner: Option<String>) -> Self {
        Self {
            id: Self::PLACEHOLDER.to_string(),
            target,
            owner: owner.unwrap_or_else(|| Self::PLACEHOLDER.to_string()),
            anchor: "0".to_string(),
            data,
            tags,
        }
    }
}
