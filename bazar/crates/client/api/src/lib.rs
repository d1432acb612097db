//! The small set of operations external collaborators call into.
//!
//! Every entry point takes a plain serde argument struct so that callers can build them from JSON.
//! Degraded reads come back as empty pages or `None`; misuse (no signer, malformed process id)
//! is an [`ApiError`].

mod args;


pub use args::{BatchGqlArgs, GqlArgs, MessageArgs, MessageOutcome, MessageResultsArgs, ReadHandlerArgs};

use bc_correlator::{CorrelatorConfig, CorrelatorError, Expectation, ResultCorrelator};
use bc_gateway::{GatewayConfig, GatewayResolver, HttpClient, TransportError, DEFAULT_REQUEST_TIMEOUT};
use bc_messenger::{HttpMessenger, MessengerConfig, Signer};
use bc_query::{QueryClient, QueryError};
use bc_state::{ReadRequest, StateConfig, StateError, StateReader};
use bp_ao::{Message, MessageResult, ProcessId, ProcessIdError, ResultPage};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("A signer is required to send messages")]
    MissingSigner,
    #[error("Invalid process id: {0}")]
    InvalidProcessId(#[from] ProcessIdError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Correlator(#[from] CorrelatorError),
    #[error("HTTP client setup failed: {0:#}")]
    Transport(#[from] TransportError),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::State(e) => e.is_rate_limited(),
            Self::Correlator(e) => e.is_rate_limited(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub request_timeout: Duration,
    pub gateway: GatewayConfig,
    pub state: StateConfig,
    pub messenger: MessengerConfig,
    pub correlator: CorrelatorConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            gateway: GatewayConfig::default(),
            state: StateConfig::default(),
            messenger: MessengerConfig::default(),
            correlator: CorrelatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BazarApi {
    query: QueryClient,
    state: StateReader,
    correlator: ResultCorrelator,
    signer: Option<Arc<dyn Signer>>,
}

impl BazarApi {
    pub fn new(query: QueryClient, state: StateReader, correlator: ResultCorrelator) -> Self {
        Self { query, state, correlator, signer: None }
    }

    /// Wires every client over one shared HTTP client.
    pub fn from_config(config: ApiConfig) -> Result<Self, ApiError> {
        let http = HttpClient::new(config.request_timeout)?;
        let resolver = Arc::new(GatewayResolver::new(config.gateway, http.clone()));
        let query = QueryClient::new(http.clone(), resolver);
        let state = StateReader::new(http.clone(), config.state);
        let messenger = Arc::new(HttpMessenger::new(http, config.messenger));
        let log = Arc::new(state.compute_unit().clone());
        let correlator = ResultCorrelator::new(messenger, log, config.correlator);
        Ok(Self::new(query, state, correlator))
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn query_client(&self) -> &QueryClient {
        &self.query
    }

    pub fn state_reader(&self) -> &StateReader {
        &self.state
    }

    pub fn correlator(&self) -> &ResultCorrelator {
        &self.correlator
    }

    #[tracing::instrument(skip(self, args), fields(gateway = args.gateway.as_deref()))]
    pub async fn get_gql_data(&self, args: GqlArgs) -> Result<ResultPage, ApiError> {
        Ok(self.query.query_on(args.gateway.as_deref(), &args.query).await?)
    }

    #[tracing::instrument(skip(self, args), fields(gateway = args.gateway.as_deref(), queries = args.entries.len()))]
    pub async fn get_batch_gql_data(&self, args: BatchGqlArgs) -> Result<BTreeMap<String, ResultPage>, ApiError> {
        Ok(self.query.batch_query_on(args.gateway.as_deref(), &args.entries).await?)
    }

    /// Sends a message and returns the evaluated result of exactly that message.
    #[tracing::instrument(skip(self, args), fields(process_id = %args.process_id, action = %args.action))]
    pub async fn message_result(&self, args: MessageArgs) -> Result<MessageOutcome, ApiError> {
        let signer = self.signer()?;
        let message = args.into_message()?;
        let (message_id, result) = self.correlator.send_and_fetch(message, signer, None).await?;
        Ok(MessageOutcome { message_id, result })
    }

    /// Sends a message and waits for the responses named in `args`.
    #[tracing::instrument(skip(self, args), fields(process_id = %args.message.process_id, action = %args.message.action))]
    pub async fn message_results(&self, args: MessageResultsArgs) -> Result<Option<MessageResult>, ApiError> {
        let signer = self.signer()?;
        let result_process_id: Option<ProcessId> = args.result_process_id.as_deref().map(str::parse).transpose()?;
        let expectation = Expectation {
            actions: args.responses,
            handler: args.handler,
            result_process_id,
            max_attempts: args.max_attempts,
            settle_delay: None,
        };
        let message = args.message.into_message()?;
        Ok(self.correlator.send_and_await(message, signer, &expectation).await?)
    }

    #[tracing::instrument(skip(self, args), fields(process_id = %args.process_id, action = %args.action))]
    pub async fn read_handler(&self, args: ReadHandlerArgs) -> Result<Option<Value>, ApiError> {
        let process_id: ProcessId = args.process_id.parse()?;
        let request = ReadRequest { process_id, action: args.action, tags: args.tags, data: args.data, owner: args.owner };
        Ok(self.state.read_handler(&request).await?)
    }

    fn signer(&self) -> Result<&dyn Signer, ApiError> {
        self.signer.as_deref().ok_or_else(|| {
            tracing::warn!("Refusing to send a message without a signer");
            ApiError::MissingSigner
        })
    }
}

impl MessageArgs {
    fn into_message(self) -> Result<Message, ApiError> {
        let target: ProcessId = self.process_id.parse()?;
        let mut message = Message::new(target, self.action);
        message.tags = self.tags;
        if let Some(data) = self.data {
            message = message.with_data(data);
        }
        Ok(message)
    }
}
