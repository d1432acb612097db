use crate::client::HttpClient;
use crate::error::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Source of gateway URLs, best first.
#[async_trait]
pub trait GatewayRanking: Send + Sync + std::fmt::Debug {
    async fn fetch(&self) -> Result<Vec<String>, TransportError>;
}

/// A fixed list, used when no ranking endpoint is configured.
#[derive(Debug, Clone)]
pub struct StaticRanking(pub Vec<String>);

#[async_trait]
impl GatewayRanking for StaticRanking {
    async fn fetch(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.0.clone())
    }
}

/// Ranking served as JSON by some HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRanking {
    client: HttpClient,
    url: String,
}

impl HttpRanking {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl GatewayRanking for HttpRanking {
    async fn fetch(&self) -> Result<Vec<String>, TransportError> {
        let body: Value = self.client.request(&self.url)?.accept_json().send_get().await?;
        Ok(parse_ranking(body))
    }
}

#[derive(Deserialize)]
struct Scored {
    url: String,
    #[serde(default)]
    score: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Peer {
    url: String,
    #[serde(default)]
    response_time_ms: Option<f64>,
}

#[derive(Deserialize)]
struct PeerMap {
    gateways: BTreeMap<String, Peer>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RankingBody {
    Urls(Vec<String>),
    Scored(Vec<Scored>),
    Peers(PeerMap),
}

/// Accepts a list of URLs, a list of `{ url, score }` (highest first) or a peer map keyed by
/// gateway id with optional response times (fastest first). Anything else yields no gateways.
pub fn parse_ranking(body: Value) -> Vec<String> {
    let urls = match serde_json::from_value::<RankingBody>(body) {
        Ok(RankingBody::Urls(urls)) => urls,
        Ok(RankingBody::Scored(mut scored)) => {
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.into_iter().map(|s| s.url).collect()
        }
        Ok(RankingBody::Peers(peers)) => {
            let mut peers: Vec<Peer> = peers.gateways.into_values().collect();
            peers.sort_by(|a, b| {
                a.response_time_ms.unwrap_or(f64::MAX).total_cmp(&b.response_time_ms.unwrap_or(f64::MAX))
            });
            peers.into_iter().map(|p| p.url).collect()
        }
        Err(_) => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| url.starts_with("http") && seen.insert(url.clone()))
        .collect()
}
