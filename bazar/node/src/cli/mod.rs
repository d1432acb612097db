pub mod analytics;
pub mod correlator;
pub mod gateway;
pub mod messenger;
pub mod state;

pub use analytics::*;
pub use correlator::*;
pub use gateway::*;
pub use messenger::*;
pub use state::*;

use anyhow::bail;
use bc_api::ApiConfig;
use bp_utils::parsers::{parse_duration, parse_tag};
use bp_utils::serde::{deserialize_duration, serialize_duration};
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bazar: query, read and follow marketplace processes.
#[derive(Clone, Debug, clap::Parser)]
#[clap(name = "bazar", version)]
pub struct Cli {
    #[clap(flatten)]
    pub params: RunParams,

    #[command(subcommand)]
    pub command: Command,
}

/// Everything that can also come from a config file.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct RunParams {
    /// Load the parameters from a toml, json or yaml file. Values in the file override the command line.
    #[arg(env = "BAZAR_CONFIG_FILE", long, value_name = "PATH", global = true)]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Timeout applied to every HTTP request.
    #[arg(env = "BAZAR_REQUEST_TIMEOUT", long, value_parser = parse_duration, default_value = "20s", global = true)]
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub request_timeout: Duration,

    /// How command results are written to stdout.
    #[arg(env = "BAZAR_OUTPUT", long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub output: OutputFormat,

    #[clap(flatten)]
    #[serde(flatten)]
    pub gateway_params: GatewayParams,

    #[clap(flatten)]
    #[serde(flatten)]
    pub state_params: StateParams,

    #[clap(flatten)]
    #[serde(flatten)]
    pub messenger_params: MessengerParams,

    #[clap(flatten)]
    #[serde(flatten)]
    pub correlator_params: CorrelatorParams,

    #[clap(flatten)]
    #[serde(flatten)]
    pub analytics_params: AnalyticsParams,
}

impl RunParams {
    /// Merges the config file, when one is given, over the command line values.
    pub fn load(self) -> anyhow::Result<Self> {
        let Some(path) = self.config_file.clone() else {
            return Ok(self);
        };

        let config = Figment::from(Serialized::defaults(&self));
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => config.merge(Toml::file(&path)),
            Some("json") => config.merge(Json::file(&path)),
            Some("yaml" | "yml") => config.merge(Yaml::file(&path)),
            _ => bail!("Unsupported file type for config file."),
        };

        let mut params: Self = config.extract()?;
        params.config_file = Some(path);
        Ok(params)
    }

    pub fn as_api_config(&self) -> ApiConfig {
        ApiConfig {
            request_timeout: self.request_timeout,
            gateway: self.gateway_params.as_gateway_config(),
            state: self.state_params.as_state_config(),
            messenger: self.messenger_params.as_messenger_config(),
            correlator: self.correlator_params.as_correlator_config(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MatchArg {
    Exact,
    FuzzyOr,
    FuzzyAnd,
    Wildcard,
}

impl From<MatchArg> for bp_ao::TagMatch {
    fn from(value: MatchArg) -> Self {
        match value {
            MatchArg::Exact => Self::Exact,
            MatchArg::FuzzyOr => Self::FuzzyOr,
            MatchArg::FuzzyAnd => Self::FuzzyAnd,
            MatchArg::Wildcard => Self::Wildcard,
        }
    }
}

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Command {
    /// Resolve and print the working gateway.
    Gateway,

    /// Query transactions on the indexing network.
    Query {
        /// Transaction ids. Passing the flag with an empty value queries nothing.
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,

        /// Tag filters as `Name=Value`. Repeated names are merged into one filter.
        #[arg(long = "tag", value_parser = parse_tag, value_name = "NAME=VALUE")]
        tags: Vec<(String, String)>,

        /// How tag values are matched.
        #[arg(long = "match", value_enum, default_value_t = MatchArg::Exact)]
        match_: MatchArg,

        #[arg(long = "owner", value_name = "ADDRESS")]
        owners: Vec<String>,

        /// Cursor returned by a previous page.
        #[arg(long)]
        after: Option<String>,

        #[arg(long)]
        min_block: Option<u64>,

        #[arg(long, requires = "min_block")]
        max_block: Option<u64>,

        #[arg(long)]
        page_size: Option<u32>,

        /// Follow cursors and print every edge, reading at most this many pages.
        #[arg(long, value_name = "PAGES")]
        all: Option<usize>,
    },

    /// Read from a process, directly from state when possible, otherwise with a dry run.
    Read {
        process_id: String,
        action: String,

        /// Additional tags as `Name=Value`.
        #[arg(long = "tag", value_parser = parse_tag, value_name = "NAME=VALUE")]
        tags: Vec<(String, String)>,

        #[arg(long)]
        data: Option<String>,

        /// Address the dry run is evaluated as.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Print the normalized current state of a process.
    State {
        process_id: String,

        /// Sub-tree to read, such as `balances`.
        #[arg(long)]
        path: Option<String>,
    },

    /// Look up the result of one message.
    Results {
        process_id: String,
        message_id: String,

        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Whether a wallet, or its profile, already claimed a claimable asset.
    ClaimStatus {
        process_id: String,
        wallet: String,

        #[arg(long)]
        profile: Option<String>,
    },

    /// Supply and claim counters of a claimable asset.
    Stats { process_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use figment::Jail;
    use rstest::rstest;

    const PID: &str = "Ge1Av2LDmbhJLv2luakYS2jPTZ1KFls4VXudFCAdDAM";

    #[rstest]
    fn defaults_convert_to_api_config() {
        let cli = Cli::try_parse_from(["bazar", "gateway"]).unwrap();
        let config = cli.params.as_api_config();

        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.gateway.default_gateway, "https://arweave.net");
        assert_eq!(config.gateway.fallback_gateways, vec!["https://arweave.net", "https://ar-io.net"]);
        assert_eq!(config.state.nodes, vec!["https://forward.computer"]);
        assert_eq!(config.state.cu_url, "https://cu.ao-testnet.xyz");
        assert_eq!(config.correlator.retry.max_attempts, 3);
        assert_eq!(config.messenger.sdk, "bazar");
    }

    #[rstest]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "bazar",
            "--state-nodes",
            "https://a.example, https://b.example",
            "--settle-delay",
            "250ms",
            "--poll-max-attempts",
            "8",
            "--gateway-fallbacks",
            "https://g.example",
            "read",
            PID,
            "Get-Orders",
            "--tag",
            "Pair=a:b",
        ])
        .unwrap();
        let config = cli.params.as_api_config();

        assert_eq!(config.state.nodes, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.correlator.settle_delay, Duration::from_millis(250));
        assert_eq!(config.correlator.retry.max_attempts, 8);
        assert_eq!(config.gateway.fallback_gateways, vec!["https://g.example"]);
        assert!(matches!(cli.command, Command::Read { ref tags, .. } if tags == &[("Pair".to_string(), "a:b".to_string())]));
    }

    #[rstest]
    fn max_block_requires_min_block() {
        assert!(Cli::try_parse_from(["bazar", "query", "--max-block", "10"]).is_err());
    }

    #[rstest]
    fn config_file_overrides_command_line() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bazar.toml",
                r#"
                    state_node_timeout = "2s"
                    poll_max_attempts = 12
                    log_format = "full"
                "#,
            )?;
            let cli = Cli::try_parse_from(["bazar", "--config-file", "bazar.toml", "--poll-max-attempts", "4", "gateway"])
                .unwrap();

            let params = cli.params.load().unwrap();

            assert_eq!(params.state_params.state_node_timeout, Duration::from_secs(2));
            assert_eq!(params.correlator_params.poll_max_attempts, 12);
            assert_eq!(params.analytics_params.log_format, bc_analytics::LogFormat::Full);
            assert_eq!(params.request_timeout, Duration::from_secs(20));
            Ok(())
        });
    }

    #[rstest]
    fn unsupported_config_file() {
        let cli = Cli::try_parse_from(["bazar", "--config-file", "bazar.ini", "gateway"]).unwrap();
        assert!(cli.params.load().is_err());
    }
}
