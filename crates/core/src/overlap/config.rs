//! Configuration for overlap resolution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Events at least this long are treated as spurious.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,

    /// Adjacent events overlapping by at least this percentage of the later
    /// event's duration are duplicates.
    #[serde(default = "default_max_overlap_percent")]
    pub max_overlap_percent: u32,

    /// Pause after each deletion request.
    #[serde(default = "default_delete_pacing_ms")]
    pub delete_pacing_ms: u64,
}

fn default_max_duration_secs() -> f64 {
    45.0
}

fn default_max_overlap_percent() -> u32 {
    25
}

fn default_delete_pacing_ms() -> u64 {
    100
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            max_overlap_percent: default_max_overlap_percent(),
            delete_pacing_ms: default_delete_pacing_ms(),
        }
    }
}
