use crate::cu::{ComputeUnitClient, DEFAULT_CU_URL};
use crate::error::StateError;
use bc_gateway::{HttpClient, TransportError};
use bp_ao::{DryRunRequest, Normalizer, ProcessId, ProcessState, Tag};
use bp_resilience::{retry_async, RetryConfig};
use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_STATE_NODE: &str = "https://forward.computer";
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Actions whose failure on the direct path is reported instead of hidden behind a dry run.
pub const CRITICAL_ACTIONS: &[&str] = &["Balance", "Balances", "Get-Claim-Status", "Get-Stats"];

const PROCESS_DEVICE: &str = "~process@1.0";

/// Direct-state route of an action: an optional narrowed sub-path and the field it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: Option<&'static str>,
    pub field: Option<&'static str>,
}

impl Route {
    const FULL: Route = Route { path: None, field: None };

    pub fn for_action(action: &str) -> Option<Route> {
        match action {
            "Info" | "Get-Stats" => Some(Self::FULL),
            "Balance" | "Balances" => Some(Route { path: Some("balances"), field: Some("Balances") }),
            "Get-Claim-Status" | "Claims" => Some(Route { path: Some("claims"), field: Some("Claims") }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateConfig {
    /// State nodes in preference order, primary first.
    pub nodes: Vec<String>,
    pub cu_url: String,
    pub node_timeout: Duration,
    pub dry_run_retry: RetryConfig,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            nodes: vec![DEFAULT_STATE_NODE.to_string()],
            cu_url: DEFAULT_CU_URL.to_string(),
            node_timeout: DEFAULT_NODE_TIMEOUT,
            dry_run_retry: RetryConfig::default(),
        }
    }
}

/// A read addressed to a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    pub process_id: ProcessId,
    pub action: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub data: Option<String>,
    /// Address the dry run is evaluated as, when the read depends on the caller.
    #[serde(default)]
    pub owner: Option<String>,
}

impl ReadRequest {
    pub fn new(process_id: ProcessId, action: impl Into<String>) -> Self {
        Self { process_id, action: action.into(), tags: Vec::new(), data: None, owner: None }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct StateReader {
    http: HttpClient,
    cu: ComputeUnitClient,
    config: StateConfig,
    normalizer: Normalizer,
}

impl StateReader {
    pub fn new(http: HttpClient, config: StateConfig) -> Self {
        let cu = ComputeUnitClient::new(http.clone(), config.cu_url.clone());
        Self { http, cu, config, normalizer: Normalizer::default() }
    }

    pub fn compute_unit(&self) -> &ComputeUnitClient {
        &self.cu
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// Reads and normalizes the current state of `process`, or the sub-tree at `path`.
    pub async fn read_state(&self, process: &ProcessId, path: Option<&str>) -> Result<ProcessState, StateError> {
        let (raw, _) = self.read_direct(process, path).await?;
        Ok(self.normalizer.normalize(&raw))
    }

    /// Tries every node in order: narrowed path first when given, then the full state.
    ///
    /// The flag tells whether the narrowed read is the one that succeeded.
    #[tracing::instrument(skip(self), fields(process_id = %process))]
    async fn read_direct(&self, process: &ProcessId, path: Option<&str>) -> Result<(Value, bool), StateError> {
        let mut last_error = None;
        for node in &self.config.nodes {
            if let Some(path) = path {
                match self.fetch_node(node, process, Some(path)).await {
                    Ok(value) => return Ok((value, true)),
                    Err(e) => {
                        tracing::debug!(node = %node, path, error_type = e.error_type(), "Narrowed state read failed: {e}");
                        last_error = Some(e);
                    }
                }
            }
            match self.fetch_node(node, process, None).await {
                Ok(value) => return Ok((value, false)),
                Err(e) => {
                    tracing::debug!(node = %node, error_type = e.error_type(), "Full state read failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.map(|e| e.to_string()).unwrap_or_else(|| "no state node configured".to_string());
        tracing::warn!(process_id = %process, "All state nodes failed: {last_error}");
        Err(StateError::AllNodesFailed { process_id: process.to_string(), last_error })
    }

    /// `GET {node}/{pid}~process@1.0/now[/{path}]`, bounded by the node timeout.
    async fn fetch_node(&self, node: &str, process: &ProcessId, path: Option<&str>) -> Result<Value, TransportError> {
        let mut request = self
            .http
            .request(node)?
            .add_uri_segment(&format!("{process}{PROCESS_DEVICE}"))?
            .add_uri_segment("now")?;
        if let Some(path) = path {
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                request = request.add_uri_segment(segment)?;
            }
        }
        let url = request.url().to_string();
        let request = request
            .accept_json()
            .add_header(HeaderName::from_static("require-codec"), HeaderValue::from_static("application/json"))
            .with_timeout(self.config.node_timeout);

        tokio::time::timeout(self.config.node_timeout, request.send_get())
            .await
            .map_err(|_| TransportError::Timeout { url })?
    }

    /// Routes a read to the direct state path or to a dry run.
    #[tracing::instrument(skip(self, request), fields(process_id = %request.process_id, action = %request.action))]
    pub async fn read_handler(&self, request: &ReadRequest) -> Result<Option<Value>, StateError> {
        let Some(route) = Route::for_action(&request.action) else {
            return self.fallback_dry_run(request).await;
        };

        match self.read_route(&request.process_id, route).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if CRITICAL_ACTIONS.contains(&request.action.as_str()) => Err(e),
            Err(e) => {
                tracing::info!("Direct state read failed, falling back to dry run: {e}");
                self.fallback_dry_run(request).await
            }
        }
    }

    /// Last step of a non-critical read: a failed dry run degrades to `None` unless rate limited.
    async fn fallback_dry_run(&self, request: &ReadRequest) -> Result<Option<Value>, StateError> {
        match self.dry_run(request).await {
            Err(StateError::DryRun(e)) if !e.is_rate_limited() => {
                tracing::warn!(error_type = e.error_type(), "Dry run failed, no value for this read: {e}");
                Ok(None)
            }
            other => other,
        }
    }

    async fn read_route(&self, process: &ProcessId, route: Route) -> Result<Value, StateError> {
        let (raw, narrowed) = self.read_direct(process, route.path).await?;
        let state = self.normalizer.normalize(&raw);

        match route.field {
            Some(field) if narrowed && state.field(field).is_none() => {
                let payload = match raw {
                    Value::Object(mut object) if object.contains_key("body") => {
                        let body = object.remove("body").unwrap_or(Value::Null);
                        match body {
                            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
                            other => other,
                        }
                    }
                    other => other,
                };
                let mut wrapped = Map::new();
                wrapped.insert(field.to_string(), payload);
                Ok(Value::Object(wrapped))
            }
            _ => Ok(state.into_inner()),
        }
    }

    /// Simulated execution on the compute unit, retried while rate limited.
    ///
    /// Returns the data of the first output message, `None` when the process produced none.
    #[tracing::instrument(skip(self, request), fields(process_id = %request.process_id, action = %request.action))]
    pub async fn dry_run(&self, request: &ReadRequest) -> Result<Option<Value>, StateError> {
        let mut tags = vec![Tag::new("Action", request.action.clone())];
        tags.extend(request.tags.iter().cloned());
        let body =
            DryRunRequest::new(request.process_id.clone(), tags, request.data.clone().unwrap_or_default(), request.owner.clone());

        let entry = retry_async(&self.config.dry_run_retry, "dry_run", |_| self.cu.dry_run(&body))
            .await
            .map_err(StateError::DryRun)?;

        if let Some(error) = entry.error.filter(|e| !e.is_null()) {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(StateError::Process { process_id: request.process_id.to_string(), message });
        }
        Ok(entry.messages.first().and_then(|message| message.data_json()))
    }
}
