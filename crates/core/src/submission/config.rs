//! Configuration for the submission pipeline and its external capabilities.

use serde::{Deserialize, Serialize};

/// Submission batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// IANA time zone used for incident dates (default: America/New_York).
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Attempts per event before the batch is aborted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed part of every retry delay.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Exponential part of the retry delay: `2^attempt` times this.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Upper bound on any retry delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// How often a retry wait checks for cancellation.
    #[serde(default = "default_poll_slice_ms")]
    pub poll_slice_ms: u64,

    /// Attachment failures tolerated before uploading to object storage.
    #[serde(default = "default_attachment_retries")]
    pub attachment_retries_before_fallback: u32,

    /// Skip events the overlap planner would delete.
    #[serde(default = "default_skip_overlapping")]
    pub skip_overlapping: bool,

    /// Zone to complaint profile table, matched in order.
    #[serde(default)]
    pub profiles: Vec<ZoneProfile>,
}

/// Complaint details for events in any of `zone_names`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneProfile {
    pub zone_names: Vec<String>,
    pub address: String,
    pub problem_description: String,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    10_000
}

fn default_backoff_unit_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10 * 60 * 1_000
}

fn default_poll_slice_ms() -> u64 {
    1_000
}

fn default_attachment_retries() -> u32 {
    1
}

fn default_skip_overlapping() -> bool {
    true
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_delay_ms: default_max_delay_ms(),
            poll_slice_ms: default_poll_slice_ms(),
            attachment_retries_before_fallback: default_attachment_retries(),
            skip_overlapping: default_skip_overlapping(),
            profiles: Vec::new(),
        }
    }
}

/// Complaint form-automation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Automation service base URL
    pub url: String,
    /// Bearer token for the automation service
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout; form steps can be slow (default: 360)
    #[serde(default = "default_portal_timeout")]
    pub timeout_secs: u64,
}

fn default_portal_timeout() -> u64 {
    360
}

/// Object storage used when clip attachment keeps failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Upload endpoint; objects are PUT to `<endpoint>/<key>`
    pub endpoint: String,
    /// Public URL prefix for uploaded objects
    pub public_base_url: String,
    /// Bearer token for uploads
    pub token: String,
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

fn default_storage_timeout() -> u64 {
    120
}
