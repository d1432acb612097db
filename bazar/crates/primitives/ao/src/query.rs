//! Compilation of transaction queries into GraphQL documents.
//!
//! Compilation is deterministic: the same [`Query`] always produces the same document, and
//! arguments are emitted in a fixed order (`ids`, `tags`, `owners`, `block`, `after`, `first`).

use crate::page::Cursor;
use crate::tag::{TagFilter, TagMatch};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const NODE_SELECTION: &str = "pageInfo { hasNextPage } edges { cursor node { id tags { name value } data { size type } owner { address } block { height timestamp } } }";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("Page size must be at least 1")]
    ZeroPageSize,
    #[error("Invalid batch key {0:?}: keys must be GraphQL names")]
    InvalidBatchKey(String),
    #[error("Batch must contain at least one query")]
    EmptyBatch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// `Some(vec![])` means "no ids at all" and never reaches the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// Ask the indexer for a total `count`. Not every gateway supports it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_count: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn tag(mut self, filter: TagFilter) -> Self {
        self.tags.push(filter);
        self
    }

    pub fn owners(mut self, owners: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.owners = Some(owners.into_iter().map(Into::into).collect());
        self
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn blocks(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_block = min;
        self.max_block = max;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn effective_page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// An explicitly provided, zero-length id list.
    pub fn has_empty_id_set(&self) -> bool {
        self.ids.as_ref().is_some_and(Vec::is_empty)
    }

    pub fn validate(&self) -> Result<(), QueryBuildError> {
        if self.page_size == Some(0) {
            return Err(QueryBuildError::ZeroPageSize);
        }
        Ok(())
    }

    /// The argument list of the `transactions` field, without parentheses.
    pub fn arguments(&self) -> String {
        let mut args = Vec::new();

        if let Some(ids) = &self.ids {
            args.push(format!("ids: {}", string_list(ids)));
        }
        if !self.tags.is_empty() {
            let tags = self.tags.iter().map(tag_filter).join(", ");
            args.push(format!("tags: [{tags}]"));
        }
        if let Some(owners) = &self.owners {
            args.push(format!("owners: {}", string_list(owners)));
        }
        if let Some(min) = self.min_block {
            let mut block = format!("block: {{min: {min}");
            if let Some(max) = self.max_block {
                let _ = write!(block, ", max: {max}");
            }
            block.push('}');
            args.push(block);
        }
        if let Some(Cursor::At(cursor)) = &self.cursor {
            args.push(format!("after: {}", quote(cursor)));
        }
        args.push(format!("first: {}", self.effective_page_size()));

        args.join(", ")
    }

    /// `transactions(...) { ... }`, optionally aliased.
    pub fn selection(&self, alias: Option<&str>) -> String {
        let count = if self.include_count { "count " } else { "" };
        let alias = alias.map(|a| format!("{a}: ")).unwrap_or_default();
        format!("{alias}transactions({}) {{ {count}{NODE_SELECTION} }}", self.arguments())
    }

    pub fn to_document(&self) -> Result<String, QueryBuildError> {
        self.validate()?;
        Ok(format!("query {{ {} }}", self.selection(None)))
    }
}

/// Compiles several queries into one document, each under its own alias.
pub fn batch_document(entries: &BTreeMap<String, Query>) -> Result<String, QueryBuildError> {
    if entries.is_empty() {
        return Err(QueryBuildError::EmptyBatch);
    }
    let mut selections = Vec::with_capacity(entries.len());
    for (key, query) in entries {
        if !is_graphql_name(key) {
            return Err(QueryBuildError::InvalidBatchKey(key.clone()));
        }
        query.validate()?;
        selections.push(query.selection(Some(key)));
    }
    Ok(format!("query {{ {} }}", selections.join(" ")))
}

/// `/[_A-Za-z][_0-9A-Za-z]*/`
pub fn is_graphql_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn string_list(items: &[String]) -> String {
    format!("[{}]", items.iter().map(|item| quote(item)).join(", "))
}

fn tag_filter(filter: &TagFilter) -> String {
    let mut out = format!("{{name: {}, values: {}", quote(&filter.name), string_list(&filter.values));
    if filter.match_ != TagMatch::Exact {
        let _ = write!(out, ", match: {}", filter.match_.keyword());
    }
    out.push('}');
    out
}
