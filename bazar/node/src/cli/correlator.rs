use bc_correlator::{CorrelatorConfig, DEFAULT_RESULTS_LIMIT};
use bp_resilience::RetryConfig;
use bp_utils::parsers::parse_duration;
use bp_utils::serde::{deserialize_duration, serialize_duration};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters used to wait for the outcome of sent messages.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct CorrelatorParams {
    /// Wait between sending a message and the first look at its results.
    #[arg(env = "BAZAR_SETTLE_DELAY", long, value_parser = parse_duration, default_value = "1s")]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub settle_delay: Duration,

    /// Number of recent results scanned per poll.
    #[arg(env = "BAZAR_RESULTS_LIMIT", long, default_value_t = DEFAULT_RESULTS_LIMIT)]
    pub results_limit: u32,

    /// Polls before giving up. Slow flows such as claims need more.
    #[arg(env = "BAZAR_POLL_MAX_ATTEMPTS", long, default_value_t = 3)]
    pub poll_max_attempts: u32,

    /// First wait after a rate limited call, doubled on every attempt.
    #[arg(env = "BAZAR_RATE_LIMIT_DELAY", long, value_parser = parse_duration, default_value = "1s")]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub rate_limit_delay: Duration,

    /// First wait while the result is not there yet, grown by 1.5 on every attempt.
    #[arg(env = "BAZAR_PENDING_DELAY", long, value_parser = parse_duration, default_value = "1s")]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub pending_delay: Duration,
}

impl CorrelatorParams {
    pub fn as_retry_config(&self) -> RetryConfig {
        RetryConfig {
            rate_limit_delay: self.rate_limit_delay,
            pending_delay: self.pending_delay,
            ..Default::default()
        }
        .with_max_attempts(self.poll_max_attempts)
    }

    pub fn as_correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            settle_delay: self.settle_delay,
            results_limit: self.results_limit,
            retry: self.as_retry_config(),
        }
    }
}
