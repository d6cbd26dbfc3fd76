use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::ingestion::IngestionConfig;
use crate::overlap::OverlapConfig;
use crate::resolution::ResolutionConfig;
use crate::review::ReviewConfig;
use crate::source::DEFAULT_PAGE_SIZE;
use crate::submission::{ObjectStorageConfig, PortalConfig, SubmissionConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub overlap: OverlapConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    pub portal: PortalConfig,
    #[serde(default)]
    pub object_storage: Option<ObjectStorageConfig>,
    pub resolution: ResolutionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Where event artifacts, staged clips and bookkeeping files live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Durable per-event directories (metadata, clip, SR, resolution)
    pub events_dir: PathBuf,
    /// Transient staging area for clips awaiting review
    pub staging_dir: PathBuf,
    /// Event database snapshot (default: `<events_dir>/database.json`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Submission watermark (default: `<events_dir>/lastSubmissionRun.json`)
    #[serde(default)]
    pub watermark_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.events_dir.join("database.json"))
    }

    pub fn watermark_path(&self) -> PathBuf {
        self.watermark_path
            .clone()
            .unwrap_or_else(|| self.events_dir.join("lastSubmissionRun.json"))
    }
}

/// Source NVR configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// NVR base URL (e.g., "http://frigate.local:5000")
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Events per window query (default: 250)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub source: SourceConfig,
    pub ingestion: IngestionConfig,
    pub overlap: OverlapConfig,
    pub review: ReviewConfig,
    pub submission: SanitizedSubmissionConfig,
    pub portal: SanitizedEndpointConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_storage: Option<SanitizedEndpointConfig>,
    pub resolution: SanitizedEndpointConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSubmissionConfig {
    pub timezone: String,
    pub max_attempts: u32,
    pub skip_overlapping: bool,
    pub attachment_retries_before_fallback: u32,
    pub profile_count: usize,
}

/// Remote endpoint with its credential hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEndpointConfig {
    pub url: String,
    pub credential_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            source: config.source.clone(),
            ingestion: config.ingestion.clone(),
            overlap: config.overlap.clone(),
            review: config.review.clone(),
            submission: SanitizedSubmissionConfig {
                timezone: config.submission.timezone.clone(),
                max_attempts: config.submission.max_attempts,
                skip_overlapping: config.submission.skip_overlapping,
                attachment_retries_before_fallback: config
                    .submission
                    .attachment_retries_before_fallback,
                profile_count: config.submission.profiles.len(),
            },
            portal: SanitizedEndpointConfig {
                url: config.portal.url.clone(),
                credential_configured: !config.portal.api_key.is_empty(),
            },
            object_storage: config
                .object_storage
                .as_ref()
                .map(|s| SanitizedEndpointConfig {
                    url: s.endpoint.clone(),
                    credential_configured: !s.token.is_empty(),
                }),
            resolution: SanitizedEndpointConfig {
                url: config.resolution.url.clone(),
                credential_configured: !config.resolution.api_key.is_empty(),
            },
        }
    }
}
