use bc_analytics::{AnalyticsConfig, LogFormat};
use serde::{Deserialize, Serialize};

/// Parameters used to config logging.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct AnalyticsParams {
    /// Name of the service.
    #[arg(env = "BAZAR_ANALYTICS_SERVICE_NAME", long, default_value = "bazar")]
    pub analytics_service_name: String,

    /// `compact` single line events or the `full` layout with spans.
    #[arg(env = "BAZAR_LOG_FORMAT", long, value_name = "FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl AnalyticsParams {
    pub fn as_analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig { service_name: self.analytics_service_name.clone(), log_format: self.log_format }
    }
}
