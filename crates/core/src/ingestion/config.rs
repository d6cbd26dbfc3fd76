//! Configuration for clip ingestion.

use serde::{Deserialize, Serialize};

/// Clip download and validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Smallest acceptable clip, in megabytes (inclusive).
    #[serde(default = "default_min_clip_mb")]
    pub min_clip_mb: f64,

    /// Largest acceptable clip, in megabytes (inclusive).
    #[serde(default = "default_max_clip_mb")]
    pub max_clip_mb: f64,

    /// Download attempts per clip.
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Base retry delay; attempt `n` waits `n` times this.
    #[serde(default = "default_retry_delay_ms")]
    pub download_retry_delay_ms: u64,

    /// Pause before each clip download.
    #[serde(default = "default_pacing_ms")]
    pub download_pacing_ms: u64,
}

fn default_min_clip_mb() -> f64 {
    1.0
}

fn default_max_clip_mb() -> f64 {
    74.0
}

fn default_download_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_pacing_ms() -> u64 {
    100
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            min_clip_mb: default_min_clip_mb(),
            max_clip_mb: default_max_clip_mb(),
            download_attempts: default_download_attempts(),
            download_retry_delay_ms: default_retry_delay_ms(),
            download_pacing_ms: default_pacing_ms(),
        }
    }
}
