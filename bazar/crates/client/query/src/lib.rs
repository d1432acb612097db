//! Transaction queries against the indexing network.
//!
//! Reads never fail because of the network: transport, status and parse failures all degrade to
//! an empty [`ResultPage`]. Only malformed queries are reported as errors.

use bc_gateway::{GatewayResolver, HttpClient, TransportError};
use bp_ao::graphql::{GraphqlRequest, GraphqlResponse, TransactionsConnection};
use bp_ao::{batch_document, Cursor, Edge, Query, QueryBuildError, ResultPage};
use std::collections::BTreeMap;
use std::sync::Arc;


const FIELD: &str = "transactions";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    Build(#[from] QueryBuildError),
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Indexer returned errors: {0}")]
    Graphql(String),
}

type Connections = BTreeMap<String, Option<TransactionsConnection>>;

#[derive(Debug, Clone)]
pub struct QueryClient {
    http: HttpClient,
    resolver: Arc<GatewayResolver>,
}

impl QueryClient {
    pub fn new(http: HttpClient, resolver: Arc<GatewayResolver>) -> Self {
        Self { http, resolver }
    }

    pub fn resolver(&self) -> &Arc<GatewayResolver> {
        &self.resolver
    }

    pub async fn query(&self, query: &Query) -> Result<ResultPage, QueryError> {
        self.query_on(None, query).await
    }

    /// Runs one query, on `gateway` when given, else on the working gateway.
    #[tracing::instrument(skip(self, query), fields(page_size = query.effective_page_size()))]
    pub async fn query_on(&self, gateway: Option<&str>, query: &Query) -> Result<ResultPage, QueryError> {
        let document = query.to_document()?;
        if query.has_empty_id_set() {
            tracing::debug!("Empty id set, skipping query");
            return Ok(ResultPage::empty(query.cursor.clone()));
        }

        let page = match self.fetch(gateway, &document).await {
            Ok(mut connections) => match connections.remove(FIELD).flatten() {
                Some(connection) => {
                    ResultPage::from_connection(connection, query.effective_page_size(), query.cursor.clone())
                }
                None => {
                    tracing::warn!("Indexer response has no transactions field");
                    ResultPage::empty(query.cursor.clone())
                }
            },
            Err(e) => {
                tracing::warn!("Query failed, returning an empty page: {e:#}");
                ResultPage::empty(query.cursor.clone())
            }
        };
        Ok(page)
    }

    pub async fn batch_query(
        &self,
        entries: &BTreeMap<String, Query>,
    ) -> Result<BTreeMap<String, ResultPage>, QueryError> {
        self.batch_query_on(None, entries).await
    }

    /// Runs several queries as one aliased document. Results are keyed like `entries`.
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn batch_query_on(
        &self,
        gateway: Option<&str>,
        entries: &BTreeMap<String, Query>,
    ) -> Result<BTreeMap<String, ResultPage>, QueryError> {
        batch_document(entries)?;

        let mut pages = BTreeMap::new();
        let mut remote = BTreeMap::new();
        for (key, query) in entries {
            if query.has_empty_id_set() {
                pages.insert(key.clone(), ResultPage::empty(query.cursor.clone()));
            } else {
                remote.insert(key.clone(), query.clone());
            }
        }
        if remote.is_empty() {
            return Ok(pages);
        }

        let document = batch_document(&remote)?;
        let mut connections = match self.fetch(gateway, &document).await {
            Ok(connections) => connections,
            Err(e) => {
                tracing::warn!("Batch query failed, returning empty pages: {e:#}");
                Connections::new()
            }
        };

        for (key, query) in remote {
            let page = match connections.remove(&key).flatten() {
                Some(connection) => {
                    ResultPage::from_connection(connection, query.effective_page_size(), query.cursor.clone())
                }
                None => ResultPage::empty(query.cursor.clone()),
            };
            pages.insert(key, page);
        }
        Ok(pages)
    }

    /// Follows `next_cursor` until the last page or until `max_pages` pages were read.
    pub async fn query_all(&self, query: &Query, max_pages: usize) -> Result<Vec<Edge>, QueryError> {
        let mut edges = Vec::new();
        let mut query = query.clone();
        for page_index in 0..max_pages {
            let page = self.query(&query).await?;
            let done = page.is_last();
            edges.extend(page.edges);
            match page.next_cursor {
                Some(Cursor::At(cursor)) if !done => query.cursor = Some(Cursor::At(cursor)),
                _ => {
                    tracing::debug!(pages = page_index + 1, edges = edges.len(), "Reached last page");
                    return Ok(edges);
                }
            }
        }
        tracing::debug!(max_pages, edges = edges.len(), "Stopped at page budget");
        Ok(edges)
    }

    async fn fetch(&self, gateway: Option<&str>, document: &str) -> Result<Connections, FetchError> {
        let url = match gateway {
            Some(url) => url.to_string(),
            None => self.resolver.get_working().await.url,
        };
        tracing::debug!(gateway = %url, "Sending query");

        let response: Result<GraphqlResponse, TransportError> = async {
            self.http
                .request(&url)?
                .add_uri_segment("graphql")?
                .accept_json()
                .send_post(&GraphqlRequest { query: document })
                .await
        }
        .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                if gateway.is_none() {
                    self.resolver.report_failure(&url, &e);
                }
                return Err(e.into());
            }
        };

        match (response.data, response.errors) {
            (Some(data), errors) => {
                if let Some(errors) = errors.filter(|errors| !errors.is_empty()) {
                    tracing::debug!(count = errors.len(), "Indexer returned partial errors");
                }
                Ok(data)
            }
            (None, errors) => {
                let message = errors
                    .unwrap_or_default()
                    .into_iter()
                    .map(|error| error.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(FetchError::Graphql(message))
            }
        }
    }
}
