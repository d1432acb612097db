use crate::graphql::{RawEdge, TransactionsConnection};
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::fmt;

const END: &str = "END";

/// Pagination cursor. `End` means there is nothing after this page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cursor {
    End,
    At(String),
}

impl Cursor {
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => f.write_str(END),
            Self::At(cursor) => f.write_str(cursor),
        }
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        if value == END {
            Self::End
        } else {
            Self::At(value)
        }
    }
}

impl From<Cursor> for String {
    fn from(value: Cursor) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub cursor: String,
    pub id: String,
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataInfo>,
}

impl From<RawEdge> for Edge {
    fn from(raw: RawEdge) -> Self {
        let node = raw.node;
        Self {
            cursor: raw.cursor,
            id: node.id,
            tags: node.tags,
            block: node.block.map(|b| BlockInfo { height: b.height, timestamp: b.timestamp }),
            owner: node.owner.map(|o| o.address),
            data: node.data.map(|d| DataInfo { size: d.size, content_type: d.content_type }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub edges: Vec<Edge>,
    pub count: u64,
    pub next_cursor: Option<Cursor>,
    pub previous_cursor: Option<Cursor>,
}

impl ResultPage {
    /// The page returned for degraded reads and empty id sets.
    pub fn empty(previous_cursor: Option<Cursor>) -> Self {
        Self { edges: Vec::new(), count: 0, next_cursor: None, previous_cursor }
    }

    /// Builds a page from an indexer connection.
    ///
    /// The page is the last one when fewer edges than `page_size` came back or the upstream says
    /// there is no next page.
    pub fn from_connection(
        connection: TransactionsConnection,
        page_size: u32,
        previous_cursor: Option<Cursor>,
    ) -> Self {
        let has_next = connection.page_info.as_ref().map(|info| info.has_next_page).unwrap_or(true);
        let edges: Vec<Edge> = connection.edges.into_iter().map(Edge::from).collect();
        let count = connection.count.unwrap_or(edges.len() as u64);

        let next_cursor = if edges.len() < page_size as usize || !has_next {
            Cursor::End
        } else {
            edges.last().map(|edge| Cursor::At(edge.cursor.clone())).unwrap_or(Cursor::End)
        };

        Self { edges, count, next_cursor: Some(next_cursor), previous_cursor }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.as_ref().map_or(true, Cursor::is_end)
    }
}
