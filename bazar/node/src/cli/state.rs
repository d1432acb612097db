use bc_state::{StateConfig, DEFAULT_CU_URL, DEFAULT_STATE_NODE};
use bp_resilience::RetryConfig;
use bp_utils::parsers::{parse_duration, parse_list, parse_url};
use bp_utils::serde::{deserialize_duration, serialize_duration};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Parameters used to read process state.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct StateParams {
    /// Comma separated state nodes, tried in order.
    #[arg(env = "BAZAR_STATE_NODES", long, value_name = "URLS", default_value = DEFAULT_STATE_NODE)]
    pub state_nodes: String,

    /// Compute unit answering dry runs and result lookups.
    #[arg(env = "BAZAR_CU_URL", long, value_parser = parse_url, default_value = DEFAULT_CU_URL)]
    pub cu_url: Url,

    /// Time budget of one state node before moving to the next one.
    #[arg(env = "BAZAR_STATE_NODE_TIMEOUT", long, value_parser = parse_duration, default_value = "10s")]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub state_node_timeout: Duration,

    /// Dry run attempts while the compute unit rate limits us.
    #[arg(env = "BAZAR_DRY_RUN_MAX_ATTEMPTS", long, default_value_t = 3)]
    pub dry_run_max_attempts: u32,
}

impl StateParams {
    pub fn as_state_config(&self) -> StateConfig {
        let mut nodes = parse_list(&self.state_nodes);
        if nodes.is_empty() {
            nodes.push(DEFAULT_STATE_NODE.to_string());
        }
        StateConfig {
            nodes,
            cu_url: self.cu_url.as_str().trim_end_matches('/').to_string(),
            node_timeout: self.state_node_timeout,
            dry_run_retry: RetryConfig::default().with_max_attempts(self.dry_run_max_attempts),
        }
    }
}
