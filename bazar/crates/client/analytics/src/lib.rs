use formatter::CustomFormatter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_core::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

mod formatter;

pub use formatter::HTTP_CALLS_TARGET;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single line events with the custom layout.
    #[default]
    Compact,
    /// The stock `tracing_subscriber` layout, spans included.
    Full,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            other => Err(format!("Unknown log format '{other}', expected 'compact' or 'full'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub service_name: String,
    pub log_format: LogFormat,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { service_name: "bazar".into(), log_format: LogFormat::default() }
    }
}

pub struct Analytics {
    config: AnalyticsConfig,
}

impl Analytics {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Installs the global subscriber. Levels come from `RUST_LOG`, INFO by default.
    ///
    /// Logs go to stderr so that command output on stdout stays machine readable.
    pub fn setup(&self) -> anyhow::Result<()> {
        let filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env()?;
        let registry = tracing_subscriber::registry().with(filter);

        match self.config.log_format {
            LogFormat::Compact => registry
                .with(tracing_subscriber::fmt::layer().event_format(CustomFormatter::new()).with_writer(std::io::stderr))
                .try_init()?,
            LogFormat::Full => registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).try_init()?,
        }

        tracing::debug!(service_name = %self.config.service_name, format = %self.config.log_format, "Logging initialized");
        Ok(())
    }
}
