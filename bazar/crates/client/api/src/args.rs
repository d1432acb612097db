use bp_ao::{MessageId, Query, ResultEntry, Tag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlArgs {
    #[serde(flatten)]
    pub query: Query,
    /// Gateway to ask instead of the working one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGqlArgs {
    pub entries: BTreeMap<String, Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageArgs {
    pub process_id: String,
    pub action: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResultsArgs {
    #[serde(flatten)]
    pub message: MessageArgs,
    /// Actions of the expected response messages.
    pub responses: Vec<String>,
    #[serde(default)]
    pub handler: Option<String>,
    /// Process that emits the responses, for messages forwarded to another process.
    #[serde(default)]
    pub result_process_id: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadHandlerArgs {
    pub process_id: String,
    pub action: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOutcome {
    pub message_id: MessageId,
    /// `None` when the message was not evaluated within the attempt budget.
    pub result: Option<ResultEntry>,
}
