use crate::error::TransportError;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::time::{Duration, Instant};
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared HTTP client. Every request carries a timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_REQUEST_TIMEOUT)
    }
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder().timeout(timeout).build().map_err(TransportError::HttpCallError)?;
        Ok(Self { inner, timeout })
    }

    pub fn with_client(inner: reqwest::Client, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn request(&self, base_url: &str) -> Result<RequestBuilder<'_>, TransportError> {
        let url = Url::parse(base_url).map_err(|_| TransportError::InvalidUrl(base_url.to_string()))?;
        Ok(RequestBuilder::new(self, url))
    }
}

#[derive(Debug)]
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    url: Url,
    params: Vec<(Cow<'static, str>, String)>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(client: &'a HttpClient, base_url: Url) -> Self {
        Self { client, url: base_url, params: Vec::new(), headers: HeaderMap::new(), timeout: None }
    }

    /// Appends one path segment, percent-encoding it as needed.
    pub fn add_uri_segment(mut self, segment: &str) -> Result<Self, TransportError> {
        let invalid = self.url.to_string();
        self.url
            .path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(invalid))?
            .pop_if_empty()
            .push(segment);
        Ok(self)
    }

    pub fn add_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn add_param(mut self, name: impl Into<Cow<'static, str>>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Overrides the client timeout for this request only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn accept_json(self) -> Self {
        self.add_header(ACCEPT, HeaderValue::from_static("application/json"))
    }

    pub fn url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.params {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    pub async fn send_get<T>(self) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let url = self.url();
        let request = self.prepare(self.client.inner.get(url.clone()));
        let start = Instant::now();
        unpack("GET", &url, start, request.send().await).await
    }

    pub async fn send_post<T, D>(self, body: &D) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        D: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body).map_err(TransportError::SerializeRequest)?;
        self.send_post_bytes(body, "application/json").await
    }

    pub async fn send_post_bytes<T>(self, body: Vec<u8>, content_type: &'static str) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let url = self.url();
        let request = self
            .prepare(self.client.inner.post(url.clone()))
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type))
            .body(body);
        let start = Instant::now();
        unpack("POST", &url, start, request.send().await).await
    }

    fn prepare(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.headers(self.headers.clone()).timeout(self.timeout.unwrap_or(self.client.timeout))
    }
}

async fn unpack<T>(
    method: &'static str,
    url: &Url,
    start: Instant,
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, TransportError>
where
    T: DeserializeOwned,
{
    let path = url.path();
    let url = url.as_str();
    let response = response.map_err(|e| TransportError::from_reqwest(url, e))?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        log_call(method, path, status, 0, start);
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(TransportError::RateLimited { url: url.to_string(), retry_after });
    }
    if status == StatusCode::NOT_FOUND {
        log_call(method, path, status, 0, start);
        return Err(TransportError::NotFound { url: url.to_string() });
    }

    let body = response.bytes().await.map_err(|e| TransportError::from_reqwest(url, e))?;
    log_call(method, path, status, body.len(), start);
    if !status.is_success() {
        let body = String::from_utf8_lossy(&body).into_owned();
        return Err(TransportError::Status { url: url.to_string(), status, body });
    }

    serde_json::from_slice(&body).map_err(|serde_error| TransportError::DeserializeBody { serde_error })
}

fn log_call(method: &str, path: &str, status: StatusCode, res_len: usize, start: Instant) {
    let status = status.as_u16() as i64;
    let res_len = res_len as u64;
    let response_time = start.elapsed().as_micros();
    let call = format!("{method} {path}");
    tracing::debug!(
        target: "http_calls",
        method = call.as_str(),
        status = status,
        res_len = res_len,
        response_time = response_time,
        "{call} {status} {res_len} - {response_time} micros"
    );
}
