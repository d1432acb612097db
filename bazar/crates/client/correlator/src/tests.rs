use crate::*;
use assert_matches::assert_matches;
use async_trait::async_trait;
use bc_messenger::{DataItem, SignedDataItem, SignerError};
use bp_ao::{OutboxMessage, Tag};
use rstest::rstest;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

const PID: &str = "Ge1Av2LDmbhJLv2luakYS2jPTZ1KFls4VXudFCAdDAM";
const TOKEN: &str = "pWBcGBn5rW2Kj7zFj4ds-9ek2FknPWHcO6Xkd8CHCPo";

type Poll = Result<Vec<ResultEntry>, TransportError>;

#[derive(Debug, Default)]
struct FakeMessenger {
    reject: bool,
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send(&self, message: Message, _signer: &dyn Signer) -> Result<MessageId, MessengerError> {
        if self.reject {
            return Err(MessengerError::Signer(SignerError::Rejected("user cancelled".into())));
        }
        Ok(format!("msg-{}", message.action))
    }
}

#[derive(Debug)]
struct NoopSigner;

#[async_trait]
impl Signer for NoopSigner {
    async fn sign(&self, _item: &DataItem) -> Result<SignedDataItem, SignerError> {
        Err(SignerError::Unavailable)
    }
}

/// Answers polls from a script, then with empty pages.
#[derive(Debug, Default)]
struct ScriptedLog {
    polls: Mutex<VecDeque<Poll>>,
    lookups: Mutex<VecDeque<Result<ResultEntry, TransportError>>>,
    polled: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedLog {
    fn with_polls(polls: impl IntoIterator<Item = Poll>) -> Arc<Self> {
        Arc::new(Self { polls: Mutex::new(polls.into_iter().collect()), ..Default::default() })
    }

    fn with_lookups(lookups: impl IntoIterator<Item = Result<ResultEntry, TransportError>>) -> Arc<Self> {
        Arc::new(Self { lookups: Mutex::new(lookups.into_iter().collect()), ..Default::default() })
    }

    fn poll_count(&self) -> usize {
        self.polled.lock().unwrap().len()
    }

    fn polled_processes(&self) -> Vec<String> {
        self.polled.lock().unwrap().iter().map(|(process, _)| process.clone()).collect()
    }
}

#[async_trait]
impl ResultLog for ScriptedLog {
    async fn latest_results(&self, process: &ProcessId, _limit: u32) -> Result<Vec<ResultEntry>, TransportError> {
        self.polled.lock().unwrap().push((process.to_string(), Instant::now()));
        self.polls.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn message_result(&self, process: &ProcessId, message_id: &str) -> Result<ResultEntry, TransportError> {
        self.polled.lock().unwrap().push((process.to_string(), Instant::now()));
        self.lookups
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::NotFound { url: format!("/result/{message_id}") }))
    }
}

fn outbox(action: &str, extra: &[(&str, &str)]) -> OutboxMessage {
    let mut tags = vec![Tag::new("Action", action)];
    tags.extend(extra.iter().map(|(name, value)| Tag::new(*name, *value)));
    OutboxMessage { tags, data: Some(json!("{\"Quantity\":\"1\"}")), target: None }
}

fn entry(messages: Vec<OutboxMessage>) -> ResultEntry {
    ResultEntry { messages, ..Default::default() }
}

fn rate_limited() -> TransportError {
    TransportError::RateLimited { url: "/results".into(), retry_after: None }
}

fn correlator(log: Arc<ScriptedLog>) -> ResultCorrelator {
    ResultCorrelator::new(Arc::new(FakeMessenger::default()), log, CorrelatorConfig::default())
}

fn pid() -> ProcessId {
    PID.parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn waits_for_every_expected_action_on_same_process() {
    let log = ScriptedLog::with_polls([
        Ok(vec![entry(vec![outbox("Order-Success", &[])])]),
        Ok(vec![entry(vec![outbox("Credit-Notice", &[])]), entry(vec![outbox("Order-Success", &[])])]),
    ]);
    let message = Message::new(pid(), "Create-Order");
    let expectation = Expectation::actions(["Order-Success", "Credit-Notice"]);

    let result = correlator(log.clone()).send_and_await(message, &NoopSigner, &expectation).await.unwrap().unwrap();

    assert_eq!(result.message_id, "msg-Create-Order");
    assert_eq!(result.responses.len(), 2);
    assert_eq!(result.responses["Credit-Notice"].data, Some(json!({ "Quantity": "1" })));
    assert_eq!(log.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn multi_hop_stops_at_first_downstream_match() {
    let log = ScriptedLog::with_polls([
        Ok(vec![entry(vec![outbox("Transfer", &[])])]),
        Ok(vec![entry(vec![outbox("Debit-Notice", &[]), outbox("Transfer", &[])])]),
    ]);
    let expectation =
        Expectation::actions(["Transfer", "Debit-Notice", "Credit-Notice"]).on_process(TOKEN.parse().unwrap());

    let result = correlator(log.clone())
        .await_responses(&pid(), "msg-1", "Transfer", &expectation)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.responses.keys().collect::<Vec<_>>(), vec!["Debit-Notice"]);
    assert_eq!(log.polled_processes(), vec![TOKEN.to_string(), TOKEN.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn nothing_found_within_budget() {
    let log = ScriptedLog::with_polls([]);
    let start = Instant::now();

    let result = correlator(log.clone())
        .await_responses(&pid(), "msg-1", "Claim", &Expectation::actions(["Claim-Success"]))
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(log.poll_count(), 3);
    // settle, then 1s and 1.5s between the three polls
    assert_eq!(start.elapsed(), Duration::from_millis(3500));
}

#[tokio::test(start_paused = true)]
async fn partial_match_is_returned_on_exhaustion() {
    let log = ScriptedLog::with_polls([Ok(vec![entry(vec![outbox("Order-Success", &[])])])]);
    let expectation = Expectation::actions(["Order-Success", "Credit-Notice"]).with_max_attempts(2);

    let result = correlator(log.clone()).await_responses(&pid(), "msg-1", "Create-Order", &expectation).await.unwrap();

    let result = result.unwrap();
    assert!(result.responses.contains_key("Order-Success"));
    assert!(!result.responses.contains_key("Credit-Notice"));
    assert_eq!(log.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_polls_back_off_then_succeed() {
    let log = ScriptedLog::with_polls([
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(vec![entry(vec![outbox("Claim-Success", &[])])]),
    ]);
    let start = Instant::now();

    let result = correlator(log.clone())
        .await_responses(&pid(), "msg-1", "Claim", &Expectation::actions(["Claim-Success"]))
        .await
        .unwrap();

    assert!(result.is_some());
    let polled = log.polled.lock().unwrap().iter().map(|(_, at)| *at - start).collect::<Vec<_>>();
    assert_eq!(polled, vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_exhaustion_is_an_error() {
    let log = ScriptedLog::with_polls([Err(rate_limited()), Err(rate_limited()), Err(rate_limited())]);

    let err = correlator(log.clone())
        .await_responses(&pid(), "msg-1", "Claim", &Expectation::actions(["Claim-Success"]))
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(log.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn fatal_poll_error_aborts() {
    let log = ScriptedLog::with_polls([Err(TransportError::InvalidUrl("nope".into()))]);

    let err = correlator(log.clone())
        .await_responses(&pid(), "msg-1", "Claim", &Expectation::actions(["Claim-Success"]))
        .await
        .unwrap_err();

    assert_matches!(err, CorrelatorError::Poll(TransportError::InvalidUrl(_)));
    assert_eq!(log.poll_count(), 1);
}

#[rstest]
#[case::matching_handler(Some("Claim"), true)]
#[case::other_handler(Some("Transfer"), false)]
#[case::no_handler(None, false)]
#[tokio::test(start_paused = true)]
async fn action_response_requires_handler(#[case] handler: Option<&str>, #[case] found: bool) {
    let tags: Vec<(&str, &str)> = handler.map(|h| ("Handler", h)).into_iter().collect();
    let log = ScriptedLog::with_polls([Ok(vec![entry(vec![outbox("Action-Response", &tags)])])]);
    let expectation = Expectation::actions(["Action-Response"]).with_handler("Claim").with_max_attempts(1);

    let result = correlator(log).await_responses(&pid(), "msg-1", "Claim", &expectation).await.unwrap();

    assert_eq!(result.is_some(), found);
}

#[tokio::test(start_paused = true)]
async fn action_response_is_ignored_without_caller_handler() {
    let log = ScriptedLog::with_polls([Ok(vec![entry(vec![
        outbox("Action-Response", &[("Handler", "Some-Other-Handler")]),
        outbox("Action-Response", &[]),
    ])])]);
    let expectation = Expectation::actions(["Action-Response"]).with_max_attempts(1);

    let result = correlator(log.clone()).await_responses(&pid(), "msg-1", "Claim", &expectation).await.unwrap();

    assert_eq!(result, None);
    assert_eq!(log.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn most_recent_response_wins() {
    let newest = outbox("Claim-Success", &[("Status", "Success"), ("Message", "second")]);
    let oldest = outbox("Claim-Success", &[("Status", "Error"), ("Message", "first")]);
    let log = ScriptedLog::with_polls([Ok(vec![entry(vec![newest]), entry(vec![oldest])])]);

    let result = correlator(log)
        .await_responses(&pid(), "msg-1", "Claim", &Expectation::actions(["Claim-Success"]))
        .await
        .unwrap()
        .unwrap();

    let response = &result.responses["Claim-Success"];
    assert_eq!(response.status, "Success");
    assert_eq!(response.message.as_deref(), Some("second"));
}

#[tokio::test(start_paused = true)]
async fn nothing_expected_does_not_poll() {
    let log = ScriptedLog::with_polls([]);
    let expectation = Expectation::actions(["Transfer"]).on_process(TOKEN.parse().unwrap());

    let result = correlator(log.clone()).await_responses(&pid(), "msg-1", "Transfer", &expectation).await.unwrap();

    assert_eq!(result, None);
    assert_eq!(log.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_failure_is_reported() {
    let correlator = ResultCorrelator::new(
        Arc::new(FakeMessenger { reject: true }),
        ScriptedLog::with_polls([]),
        CorrelatorConfig::default(),
    );

    let err = correlator
        .send_and_await(Message::new(pid(), "Claim"), &NoopSigner, &Expectation::actions(["Claim-Success"]))
        .await
        .unwrap_err();

    assert_matches!(err, CorrelatorError::Send(MessengerError::Signer(_)));
}

#[tokio::test(start_paused = true)]
async fn message_result_waits_while_not_evaluated() {
    let log = ScriptedLog::with_lookups([
        Err(TransportError::NotFound { url: "/result/msg-Claim".into() }),
        Ok(entry(vec![outbox("Claim-Success", &[])])),
    ]);

    let (message_id, result) =
        correlator(log.clone()).send_and_fetch(Message::new(pid(), "Claim"), &NoopSigner, None).await.unwrap();

    assert_eq!(message_id, "msg-Claim");
    assert_eq!(result.unwrap().messages[0].action(), Some("Claim-Success"));
    assert_eq!(log.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn message_result_not_evaluated_in_time() {
    let log = ScriptedLog::with_lookups([]);

    let result = correlator(log.clone()).await_message_result(&pid(), "msg-1", Some(2)).await.unwrap();

    assert_eq!(result, None);
    assert_eq!(log.poll_count(), 2);
}
