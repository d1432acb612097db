use crate::client::HttpClient;
use crate::error::TransportError;
use crate::probe::{HttpLivenessProbe, LivenessProbe, DEFAULT_PROBE_TIMEOUT};
use crate::ranking::{GatewayRanking, HttpRanking, StaticRanking};
use bp_resilience::{Clock, SystemClock, TtlCache};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

pub const DEFAULT_GATEWAY: &str = "https://arweave.net";
pub const FALLBACK_GATEWAYS: &[&str] = &["https://arweave.net", "https://ar-io.net"];
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_PROBES: usize = 5;

const WORKING: &str = "working";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub url: String,
    /// Position in the ranked list, 0 is best.
    pub rank: usize,
    pub last_health_check_at: Option<Instant>,
    pub cached_until: Option<Instant>,
}

impl Gateway {
    pub fn new(url: impl Into<String>, rank: usize) -> Self {
        Self { url: url.into(), rank, last_health_check_at: None, cached_until: None }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Endpoint serving the ranked gateway list. The fallback list is used when unset.
    pub ranking_url: Option<String>,
    pub fallback_gateways: Vec<String>,
    /// Returned, uncached, when no candidate answers.
    pub default_gateway: String,
    pub cache_ttl: Duration,
    pub probe_timeout: Duration,
    pub max_probes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ranking_url: None,
            fallback_gateways: FALLBACK_GATEWAYS.iter().map(|s| s.to_string()).collect(),
            default_gateway: DEFAULT_GATEWAY.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_probes: DEFAULT_MAX_PROBES,
        }
    }
}

/// Picks a live gateway out of a ranked list without any coordinator.
///
/// The ranked list is loaded once; concurrent first callers share the same load. The last gateway
/// that passed a health check is cached for `cache_ttl`. Health checks never fail the caller.
#[derive(Debug)]
pub struct GatewayResolver {
    config: GatewayConfig,
    ranking: Arc<dyn GatewayRanking>,
    probe: Arc<dyn LivenessProbe>,
    ranked: OnceCell<Vec<Gateway>>,
    cursor: AtomicUsize,
    working: TtlCache<&'static str, Gateway>,
    health_checks: DashMap<String, Instant>,
}

impl GatewayResolver {
    pub fn new(config: GatewayConfig, client: HttpClient) -> Self {
        let ranking: Arc<dyn GatewayRanking> = match &config.ranking_url {
            Some(url) => Arc::new(HttpRanking::new(client.clone(), url.clone())),
            None => Arc::new(StaticRanking(config.fallback_gateways.clone())),
        };
        let probe = Arc::new(HttpLivenessProbe::new(client, config.probe_timeout));
        Self::with_parts(config, ranking, probe, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: GatewayConfig,
        ranking: Arc<dyn GatewayRanking>,
        probe: Arc<dyn LivenessProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            working: TtlCache::with_clock(config.cache_ttl, clock),
            config,
            ranking,
            probe,
            ranked: OnceCell::new(),
            cursor: AtomicUsize::new(0),
            health_checks: DashMap::new(),
        }
    }

    /// The ranked list, loading it on first use.
    pub async fn ranked(&self) -> &[Gateway] {
        self.ranked.get_or_init(|| self.load_ranking()).await
    }

    async fn load_ranking(&self) -> Vec<Gateway> {
        let urls = match self.ranking.fetch().await {
            Ok(urls) if !urls.is_empty() => urls,
            Ok(_) => {
                tracing::warn!("Gateway ranking is empty, using fallback gateways");
                self.config.fallback_gateways.clone()
            }
            Err(e) => {
                tracing::warn!(error_type = e.error_type(), "Could not fetch gateway ranking, using fallback gateways: {e}");
                self.config.fallback_gateways.clone()
            }
        };
        let urls = if urls.is_empty() { vec![self.config.default_gateway.clone()] } else { urls };
        tracing::info!(count = urls.len(), top = %urls[0], "Loaded gateway ranking");
        urls.into_iter().enumerate().map(|(rank, url)| Gateway::new(url, rank)).collect()
    }

    /// A usable gateway: the cached working one if still fresh, else the top ranked one.
    pub async fn resolve(&self) -> Gateway {
        if let Some(gateway) = self.working.get(&WORKING) {
            return gateway;
        }
        let ranked = self.ranked().await;
        ranked.first().cloned().unwrap_or_else(|| Gateway::new(self.config.default_gateway.clone(), 0))
    }

    /// Round-robin over the ranked list.
    pub async fn next(&self) -> Gateway {
        let ranked = self.ranked().await;
        if ranked.is_empty() {
            return Gateway::new(self.config.default_gateway.clone(), 0);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % ranked.len();
        ranked[index].clone()
    }

    /// Probes a single gateway and records when it was checked.
    pub async fn test_liveness(&self, gateway: &Gateway) -> bool {
        let live = self.probe.is_live(&gateway.url).await;
        self.health_checks.insert(gateway.url.clone(), self.working.clock().now());
        tracing::debug!(gateway = %gateway.url, live, "Gateway health check");
        live
    }

    pub fn last_health_check(&self, url: &str) -> Option<Instant> {
        self.health_checks.get(url).map(|at| *at)
    }

    /// The cached known-good gateway, or the first of the top candidates to pass a health check.
    ///
    /// When every candidate fails the default gateway is returned and nothing is cached, so the
    /// next call probes again.
    #[tracing::instrument(skip(self))]
    pub async fn get_working(&self) -> Gateway {
        if let Some(gateway) = self.working.get(&WORKING) {
            return gateway;
        }

        let ranked = self.ranked().await;
        for candidate in ranked.iter().take(self.config.max_probes) {
            if self.test_liveness(candidate).await {
                let now = self.working.clock().now();
                let gateway = Gateway {
                    last_health_check_at: Some(now),
                    cached_until: Some(now + self.working.ttl()),
                    ..candidate.clone()
                };
                self.working.set(WORKING, gateway.clone());
                tracing::info!(gateway = %gateway.url, rank = gateway.rank, "Selected working gateway");
                return gateway;
            }
        }

        tracing::warn!(default = %self.config.default_gateway, "No gateway passed the health check");
        Gateway::new(self.config.default_gateway.clone(), ranked.len())
    }

    /// Forgets the working gateway, typically after a request through it failed.
    pub fn invalidate(&self) {
        self.working.invalidate(&WORKING);
    }

    /// Invalidates only if `url` is the cached gateway.
    pub fn report_failure(&self, url: &str, error: &TransportError) {
        if self.working.get(&WORKING).is_some_and(|gateway| gateway.url == url) && !error.is_rate_limited() {
            tracing::debug!(gateway = url, error_type = error.error_type(), "Dropping working gateway");
            self.invalidate();
        }
    }
}
