//! HTTP transport and gateway selection shared by the bazar network clients.

mod client;
mod error;
mod probe;
mod ranking;
mod resolver;

pub use client::{HttpClient, RequestBuilder, DEFAULT_REQUEST_TIMEOUT};
pub use error::TransportError;
pub use probe::{HttpLivenessProbe, LivenessProbe, DEFAULT_PROBE_TIMEOUT};
pub use ranking::{parse_ranking, GatewayRanking, HttpRanking, StaticRanking};
pub use resolver::{
    Gateway, GatewayConfig, GatewayResolver, DEFAULT_CACHE_TTL, DEFAULT_GATEWAY, DEFAULT_MAX_PROBES, FALLBACK_GATEWAYS,
};
