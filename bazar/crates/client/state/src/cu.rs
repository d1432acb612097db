use bc_gateway::{HttpClient, TransportError};
use bp_ao::{DryRunRequest, ProcessId, ResultEntry, ResultsPage};

pub const DEFAULT_CU_URL: &str = "https://cu.ao-testnet.xyz";

/// Client of a compute unit: simulated execution and the evaluated result log.
#[derive(Debug, Clone)]
pub struct ComputeUnitClient {
    http: HttpClient,
    url: String,
}

impl ComputeUnitClient {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `POST {cu}/dry-run?process-id={pid}`
    pub async fn dry_run(&self, request: &DryRunRequest) -> Result<ResultEntry, TransportError> {
        self.http
            .request(&self.url)?
            .add_uri_segment("dry-run")?
            .add_param("process-id", request.target.as_str())
            .accept_json()
            .send_post(request)
            .await
    }

    /// `GET {cu}/result/{message}?process-id={pid}`
    pub async fn result(&self, process: &ProcessId, message_id: &str) -> Result<ResultEntry, TransportError> {
        self.http
            .request(&self.url)?
            .add_uri_segment("result")?
            .add_uri_segment(message_id)?
            .add_param("process-id", process.as_str())
            .accept_json()
            .send_get()
            .await
    }

    /// `GET {cu}/results/{pid}?sort=DESC&limit={limit}`, most recent first.
    pub async fn results(&self, process: &ProcessId, limit: u32) -> Result<ResultsPage, TransportError> {
        self.http
            .request(&self.url)?
            .add_uri_segment("results")?
            .add_uri_segment(process.as_str())?
            .add_param("sort", "DESC")
            .add_param("limit", limit)
            .accept_json()
            .send_get()
            .await
    }
}
