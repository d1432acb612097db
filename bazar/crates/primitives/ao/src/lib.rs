//! Shared domain types for talking to processes, the indexing network and compute units.

pub mod graphql;
pub mod message;
pub mod page;
pub mod process_id;
pub mod query;
pub mod state;
pub mod tag;

pub use message::{
    ActionResponse, DryRunRequest, InvalidMessage, Message, MessageId, MessageResult, OutboxMessage, ResultEdge,
    ResultEntry, ResultsPage,
};
pub use page::{Cursor, Edge, ResultPage};
pub use process_id::{ProcessId, ProcessIdError};
pub use query::{batch_document, Query, QueryBuildError, DEFAULT_PAGE_SIZE};
pub use state::{Normalizer, ProcessState};
pub use tag::{Tag, TagFilter, TagMatch, TagsExt};
