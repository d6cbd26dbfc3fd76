//! Clip size validation and retrying downloads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::metrics;
use crate::source::EventSource;

use super::{IngestionConfig, IngestionError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Where a clip size falls relative to the accepted window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSize {
    TooSmall,
    Valid,
    TooLarge,
}

/// Inclusive clip size window in megabytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSizePolicy {
    pub min_mb: f64,
    pub max_mb: f64,
}

impl ClipSizePolicy {
    pub fn new(min_mb: f64, max_mb: f64) -> Self {
        Self { min_mb, max_mb }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(config.min_clip_mb, config.max_clip_mb)
    }

    pub fn classify(&self, bytes: u64) -> ClipSize {
        let mb = to_megabytes(bytes);
        if mb < self.min_mb {
            ClipSize::TooSmall
        } else if mb > self.max_mb {
            ClipSize::TooLarge
        } else {
            ClipSize::Valid
        }
    }

    pub fn is_valid(&self, bytes: u64) -> bool {
        self.classify(bytes) == ClipSize::Valid
    }
}

impl Default for ClipSizePolicy {
    fn default() -> Self {
        Self::from_config(&IngestionConfig::default())
    }
}

/// Downloads clips with bounded retries and size checks.
///
/// A clip that lands too small is retried; one that lands too large is
/// rejected immediately since the recording will not shrink.
pub struct ClipDownloader {
    source: Arc<dyn EventSource>,
    policy: ClipSizePolicy,
    attempts: u32,
    retry_delay: Duration,
    pacing: Duration,
}

impl ClipDownloader {
    pub fn new(source: Arc<dyn EventSource>, config: &IngestionConfig) -> Self {
        Self {
            source,
            policy: ClipSizePolicy::from_config(config),
            attempts: config.download_attempts.max(1),
            retry_delay: Duration::from_millis(config.download_retry_delay_ms),
            pacing: Duration::from_millis(config.download_pacing_ms),
        }
    }

    pub fn policy(&self) -> &ClipSizePolicy {
        &self.policy
    }

    /// Download `event_id`'s clip to `dest`, returning its size in bytes.
    pub async fn download(&self, event_id: &str, dest: &Path) -> Result<u64, IngestionError> {
        tokio::time::sleep(self.pacing).await;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| crate::artifacts::ArtifactError::io(parent, e))?;
        }

        for attempt in 1..=self.attempts {
            match self.source.download_clip(event_id, dest).await {
                Ok(bytes) => match self.policy.classify(bytes) {
                    ClipSize::Valid => {
                        metrics::CLIP_SIZE_MB
                            .with_label_values(&[])
                            .observe(to_megabytes(bytes));
                        return Ok(bytes);
                    }
                    ClipSize::TooLarge => {
                        metrics::CLIP_DOWNLOAD_FAILURES
                            .with_label_values(&["too_large"])
                            .inc();
                        return Err(IngestionError::ClipTooLarge {
                            event_id: event_id.to_string(),
                            megabytes: to_megabytes(bytes),
                        });
                    }
                    ClipSize::TooSmall => {
                        metrics::CLIP_DOWNLOAD_FAILURES
                            .with_label_values(&["too_small"])
                            .inc();
                        warn!(
                            event_id,
                            megabytes = to_megabytes(bytes),
                            "Downloaded clip too small"
                        );
                    }
                },
                Err(e) => {
                    metrics::CLIP_DOWNLOAD_FAILURES
                        .with_label_values(&["source_error"])
                        .inc();
                    if attempt == self.attempts {
                        return Err(e.into());
                    }
                    warn!(event_id, error = %e, "Clip download failed");
                }
            }

            if attempt < self.attempts {
                info!(
                    event_id,
                    attempt,
                    max_attempts = self.attempts,
                    "Retrying clip download"
                );
                tokio::time::sleep(self.retry_delay * attempt).await;
            }
        }

        Err(IngestionError::DownloadFailed {
            event_id: event_id.to_string(),
            attempts: self.attempts,
        })
    }
}
