use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::artifacts::{read_json, write_json, ArtifactError};
use crate::event::SubmissionRun;

/// Durable record of the last event the submission pipeline finished.
#[derive(Debug, Clone)]
pub struct Watermark {
    path: PathBuf,
}

impl Watermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Option<SubmissionRun>, ArtifactError> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }
        read_json(&self.path).await.map(Some)
    }

    pub async fn write(&self, run: &SubmissionRun) -> Result<(), ArtifactError> {
        write_json(&self.path, run).await
    }

    /// Create the watermark at `now` unless one already exists. Returns the
    /// watermark in effect.
    pub async fn seed(&self, now: DateTime<Utc>) -> Result<SubmissionRun, ArtifactError> {
        if let Some(existing) = self.read().await? {
            return Ok(existing);
        }
        let run = SubmissionRun { last_run_time: now };
        self.write(&run).await?;
        info!(last_run_time = %now, "Submission watermark seeded");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seed_only_once() {
        let temp = TempDir::new().unwrap();
        let watermark = Watermark::new(temp.path().join("lastSubmissionRun.json"));
        assert!(watermark.read().await.unwrap().is_none());

        let first = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let later = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        assert_eq!(watermark.seed(first).await.unwrap().last_run_time, first);
        assert_eq!(watermark.seed(later).await.unwrap().last_run_time, first);

        let raw = std::fs::read_to_string(watermark.path()).unwrap();
        assert!(raw.contains("lastRunTime"));
    }
}
