//! Configuration for resolution tracking.

use serde::{Deserialize, Serialize};

use crate::event::CLOSED_STATUS_CODE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Status endpoint; queried as `<url>?srnumber=<number>`
    pub url: String,
    /// Subscription key sent as `Ocp-Apim-Subscription-Key`
    #[serde(default)]
    pub api_key: String,
    /// Wait after a 429 before asking again (default: 60)
    #[serde(default = "default_rate_limit_wait_secs")]
    pub rate_limit_wait_secs: u64,
    /// Status code meaning the request is closed
    #[serde(default = "default_closed_status")]
    pub closed_status: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rate_limit_wait_secs() -> u64 {
    60
}

fn default_closed_status() -> String {
    CLOSED_STATUS_CODE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
