//! Matching of a sent message with the responses it caused.
//!
//! Responses are produced asynchronously, possibly by another process than the one the message
//! was sent to. After sending, the correlator waits a settle delay and then polls the most recent
//! results, scanning outgoing messages for the expected `Action` tags:
//!
//! ```text
//! Sent -> Waiting -> poll -> Found
//!                      |
//!                      +-> Retrying -> poll ...
//!                      +-> Exhausted
//! ```

mod log;

#[cfg(test)]
mod tests;

pub use log::ResultLog;

use bc_gateway::TransportError;
use bc_messenger::{Messenger, MessengerError, Signer};
use bp_ao::{ActionResponse, Message, MessageId, MessageResult, ProcessId, ResultEntry, TagsExt};
use bp_resilience::{RetryClass, RetryConfig, RetryDecision, RetryState, Retryable};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RESULTS_LIMIT: u32 = 10;

const ACTION_RESPONSE: &str = "Action-Response";

#[derive(Debug, thiserror::Error)]
pub enum CorrelatorError {
    #[error(transparent)]
    Send(#[from] MessengerError),
    #[error("Polling results failed: {0:#}")]
    Poll(#[source] TransportError),
}

impl CorrelatorError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Send(e) => e.is_rate_limited(),
            Self::Poll(e) => e.is_rate_limited(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub settle_delay: Duration,
    pub results_limit: u32,
    pub retry: RetryConfig,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self { settle_delay: DEFAULT_SETTLE_DELAY, results_limit: DEFAULT_RESULTS_LIMIT, retry: RetryConfig::default() }
    }
}

/// What a caller waits for after sending.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    /// Actions of the response messages.
    pub actions: Vec<String>,
    /// Required `Handler` tag on `Action-Response` messages.
    pub handler: Option<String>,
    /// Process whose results hold the responses, when not the target itself.
    pub result_process_id: Option<ProcessId>,
    pub max_attempts: Option<u32>,
    pub settle_delay: Option<Duration>,
}

impl Expectation {
    pub fn actions(actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { actions: actions.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn on_process(mut self, process: ProcessId) -> Self {
        self.result_process_id = Some(process);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResultCorrelator {
    messenger: Arc<dyn Messenger>,
    log: Arc<dyn ResultLog>,
    config: CorrelatorConfig,
}

impl ResultCorrelator {
    pub fn new(messenger: Arc<dyn Messenger>, log: Arc<dyn ResultLog>, config: CorrelatorConfig) -> Self {
        Self { messenger, log, config }
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Sends `message` and waits for the expected responses.
    ///
    /// `Ok(None)` means nothing was found within the attempt budget; the message may still be
    /// processed later. A partial match is returned as is.
    pub async fn send_and_await(
        &self,
        message: Message,
        signer: &dyn Signer,
        expectation: &Expectation,
    ) -> Result<Option<MessageResult>, CorrelatorError> {
        let process = message.target.clone();
        let action = message.action.clone();
        let message_id = self.messenger.send(message, signer).await?;
        self.await_responses(&process, &message_id, &action, expectation).await
    }

    /// Sends `message` and fetches the result of exactly that message.
    pub async fn send_and_fetch(
        &self,
        message: Message,
        signer: &dyn Signer,
        max_attempts: Option<u32>,
    ) -> Result<(MessageId, Option<ResultEntry>), CorrelatorError> {
        let process = message.target.clone();
        let message_id = self.messenger.send(message, signer).await?;
        let result = self.await_message_result(&process, &message_id, max_attempts).await?;
        Ok((message_id, result))
    }

    /// The polling half of [`Self::send_and_await`].
    #[tracing::instrument(skip(self, expectation), fields(result_process_id))]
    pub async fn await_responses(
        &self,
        process: &ProcessId,
        message_id: &str,
        original_action: &str,
        expectation: &Expectation,
    ) -> Result<Option<MessageResult>, CorrelatorError> {
        let poll_process = expectation.result_process_id.as_ref().unwrap_or(process);
        let multi_hop = poll_process != process;
        tracing::Span::current().record("result_process_id", tracing::field::display(poll_process));

        let mut expected: BTreeSet<String> = expectation.actions.iter().cloned().collect();
        if multi_hop {
            expected.remove(original_action);
        }
        if expected.is_empty() {
            tracing::debug!("No response expected");
            return Ok(None);
        }

        tokio::time::sleep(expectation.settle_delay.unwrap_or(self.config.settle_delay)).await;

        let mut result = MessageResult::new(message_id.to_string());
        let mut retry = RetryState::new(self.retry_config(expectation.max_attempts));
        loop {
            let class = match self.log.latest_results(poll_process, self.config.results_limit).await {
                Ok(entries) => {
                    collect_responses(&entries, &expected, expectation.handler.as_deref(), &mut result);
                    let done = if multi_hop { !result.is_empty() } else { result.covers(&expected) };
                    if done {
                        tracing::info!(found = result.responses.len(), attempt = retry.attempts() + 1, "Responses found");
                        return Ok(Some(result));
                    }
                    RetryClass::Pending
                }
                Err(e) => {
                    let class = e.retry_class();
                    if class == RetryClass::Fatal {
                        tracing::warn!(error_type = e.error_type(), "Polling results failed: {e}");
                        return Err(CorrelatorError::Poll(e));
                    }
                    if retry.attempts() + 1 >= retry.max_attempts() && e.is_rate_limited() {
                        tracing::warn!(attempts = retry.attempts() + 1, "Still rate limited, giving up");
                        return Err(CorrelatorError::Poll(e));
                    }
                    class
                }
            };

            match retry.next(class) {
                RetryDecision::Retry(delay) => {
                    tracing::debug!(
                        attempt = retry.attempts(),
                        ?class,
                        delay_ms = delay.as_millis() as u64,
                        missing = expected.len() - result.responses.len(),
                        "Responses not complete, polling again"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => break,
            }
        }

        if result.is_empty() {
            tracing::info!(attempts = retry.attempts(), "No response found");
            Ok(None)
        } else {
            tracing::info!(found = result.responses.len(), expected = expected.len(), "Returning partial responses");
            Ok(Some(result))
        }
    }

    /// Looks up the result of one message, waiting while it is not evaluated yet.
    #[tracing::instrument(skip(self), fields(process_id = %process))]
    pub async fn await_message_result(
        &self,
        process: &ProcessId,
        message_id: &str,
        max_attempts: Option<u32>,
    ) -> Result<Option<ResultEntry>, CorrelatorError> {
        let mut retry = RetryState::new(self.retry_config(max_attempts));
        loop {
            let error = match self.log.message_result(process, message_id).await {
                Ok(entry) => return Ok(Some(entry)),
                Err(e) => e,
            };
            match retry.next(error.retry_class()) {
                RetryDecision::Retry(delay) => {
                    tracing::debug!(attempt = retry.attempts(), error_type = error.error_type(), "Result not ready");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp if error.is_not_found() => return Ok(None),
                RetryDecision::GiveUp => return Err(CorrelatorError::Poll(error)),
            }
        }
    }

    fn retry_config(&self, max_attempts: Option<u32>) -> RetryConfig {
        match max_attempts {
            Some(max_attempts) => self.config.retry.clone().with_max_attempts(max_attempts),
            None => self.config.retry.clone(),
        }
    }
}

/// Records the first (most recent) outgoing message for every expected action not found yet.
fn collect_responses(
    entries: &[ResultEntry],
    expected: &BTreeSet<String>,
    handler: Option<&str>,
    result: &mut MessageResult,
) {
    for message in entries.iter().flat_map(|entry| entry.messages.iter()) {
        let Some(action) = message.action() else { continue };
        if !expected.contains(action) || result.responses.contains_key(action) {
            continue;
        }
        // Without a caller handler there is nothing to match an `Action-Response` against.
        if action == ACTION_RESPONSE && (handler.is_none() || message.tags.get_tag("Handler") != handler) {
            continue;
        }
        result.responses.insert(action.to_string(), ActionResponse::from_outbox(message));
    }
}
