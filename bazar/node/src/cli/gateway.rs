use bc_gateway::{GatewayConfig, DEFAULT_MAX_PROBES, FALLBACK_GATEWAYS};
use bp_utils::parsers::{parse_duration, parse_list, parse_url};
use bp_utils::serde::{deserialize_duration, serialize_duration};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Parameters used to pick a gateway of the indexing network.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct GatewayParams {
    /// Endpoint serving the ranked gateway list. Without it the fallback list is probed in order.
    #[arg(env = "BAZAR_GATEWAY_RANKING_URL", long, value_parser = parse_url, value_name = "URL")]
    pub gateway_ranking_url: Option<Url>,

    /// Comma separated gateways used when no ranking is available.
    #[arg(env = "BAZAR_GATEWAY_FALLBACKS", long, value_name = "URLS")]
    pub gateway_fallbacks: Option<String>,

    /// Gateway used, uncached, when every candidate fails its health check.
    #[arg(env = "BAZAR_GATEWAY_DEFAULT", long, value_parser = parse_url, default_value = "https://arweave.net")]
    pub gateway_default: Url,

    /// How long a gateway that passed its health check is reused.
    #[arg(env = "BAZAR_GATEWAY_CACHE_TTL", long, value_parser = parse_duration, default_value = "5min")]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub gateway_cache_ttl: Duration,

    #[arg(env = "BAZAR_GATEWAY_PROBE_TIMEOUT", long, value_parser = parse_duration, default_value = "5s")]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub gateway_probe_timeout: Duration,

    /// Upper bound on health checks per resolution.
    #[arg(env = "BAZAR_GATEWAY_MAX_PROBES", long, default_value_t = DEFAULT_MAX_PROBES)]
    pub gateway_max_probes: usize,
}

impl GatewayParams {
    pub fn as_gateway_config(&self) -> GatewayConfig {
        let fallback_gateways = match self.gateway_fallbacks.as_deref().map(parse_list) {
            Some(list) if !list.is_empty() => list,
            _ => FALLBACK_GATEWAYS.iter().map(|s| s.to_string()).collect(),
        };
        GatewayConfig {
            ranking_url: self.gateway_ranking_url.as_ref().map(Url::to_string),
            fallback_gateways,
            default_gateway: self.gateway_default.as_str().trim_end_matches('/').to_string(),
            cache_ttl: self.gateway_cache_ttl,
            probe_timeout: self.gateway_probe_timeout,
            max_probes: self.gateway_max_probes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_gateway::{DEFAULT_CACHE_TTL, DEFAULT_GATEWAY, DEFAULT_PROBE_TIMEOUT};
    use clap::Parser;

    #[derive(Debug, clap::Parser)]
    struct GatewayOnly {
        #[clap(flatten)]
        params: GatewayParams,
    }

    #[test]
    fn flag_defaults_match_library_defaults() {
        let params = GatewayOnly::try_parse_from(["bazar"]).unwrap().params;
        let config = params.as_gateway_config();
        let library = GatewayConfig::default();

        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.default_gateway, DEFAULT_GATEWAY);
        assert_eq!(config.max_probes, library.max_probes);
        assert_eq!(config.fallback_gateways, library.fallback_gateways);
    }
}
