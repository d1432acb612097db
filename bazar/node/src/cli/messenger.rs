use bc_messenger::{MessengerConfig, DEFAULT_MU_URL};
use bp_utils::parsers::parse_url;
use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters used to submit messages.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct MessengerParams {
    /// Message unit receiving signed messages.
    #[arg(env = "BAZAR_MU_URL", long, value_parser = parse_url, default_value = DEFAULT_MU_URL)]
    pub mu_url: Url,

    /// Value of the `SDK` tag on every sent message.
    #[arg(env = "BAZAR_SDK_NAME", long, default_value = "bazar")]
    pub sdk_name: String,
}

impl MessengerParams {
    pub fn as_messenger_config(&self) -> MessengerConfig {
        MessengerConfig { mu_url: self.mu_url.as_str().trim_end_matches('/').to_string(), sdk: self.sdk_name.clone() }
    }
}
