use async_trait::async_trait;
use bc_gateway::TransportError;
use bc_state::ComputeUnitClient;
use bp_ao::{ProcessId, ResultEntry};

/// Source of evaluated results of a process.
#[async_trait]
pub trait ResultLog: Send + Sync + std::fmt::Debug {
    /// Up to `limit` results, most recent first.
    async fn latest_results(&self, process: &ProcessId, limit: u32) -> Result<Vec<ResultEntry>, TransportError>;

    /// Result of one message, [`TransportError::NotFound`] until it is evaluated.
    async fn message_result(&self, process: &ProcessId, message_id: &str) -> Result<ResultEntry, TransportError>;
}

#[async_trait]
impl ResultLog for ComputeUnitClient {
    async fn latest_results(&self, process: &ProcessId, limit: u32) -> Result<Vec<ResultEntry>, TransportError> {
        let page = self.results(process, limit).await?;
        Ok(page.edges.into_iter().map(|edge| edge.node).collect())
    }

    async fn message_result(&self, process: &ProcessId, message_id: &str) -> Result<ResultEntry, TransportError> {
        self.result(process, message_id).await
    }
}
