use bc_gateway::TransportError;
use bp_ao::ProcessIdError;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Invalid process id: {0}")]
    InvalidProcessId(#[from] ProcessIdError),
    #[error("No state node could serve process {process_id}: {last_error}")]
    AllNodesFailed { process_id: String, last_error: String },
    #[error("Dry run failed: {0:#}")]
    DryRun(#[source] TransportError),
    #[error("Process {process_id} reported an error: {message}")]
    Process { process_id: String, message: String },
}

impl StateError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::DryRun(e) if e.is_rate_limited())
    }
}
