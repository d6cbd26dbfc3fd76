use chrono_tz::Tz;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Events and staging directories differ
/// - Submission time zone is a known IANA name
/// - Page size, attempt budgets and clip size window are usable
/// - Every zone profile names at least one zone
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.storage.events_dir == config.storage.staging_dir {
        return Err(invalid(
            "storage.events_dir and storage.staging_dir must be different directories",
        ));
    }

    if config.source.page_size == 0 {
        return Err(invalid("source.page_size cannot be 0"));
    }

    let ingestion = &config.ingestion;
    if ingestion.min_clip_mb > ingestion.max_clip_mb {
        return Err(invalid(&format!(
            "ingestion.min_clip_mb ({}) exceeds ingestion.max_clip_mb ({})",
            ingestion.min_clip_mb, ingestion.max_clip_mb
        )));
    }
    if ingestion.download_attempts == 0 {
        return Err(invalid("ingestion.download_attempts cannot be 0"));
    }

    let submission = &config.submission;
    if submission.timezone.parse::<Tz>().is_err() {
        return Err(invalid(&format!(
            "submission.timezone '{}' is not a known time zone",
            submission.timezone
        )));
    }
    if submission.max_attempts == 0 {
        return Err(invalid("submission.max_attempts cannot be 0"));
    }
    if let Some(index) = submission
        .profiles
        .iter()
        .position(|p| p.zone_names.is_empty())
    {
        return Err(invalid(&format!(
            "submission.profiles[{}] has no zone_names",
            index
        )));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
