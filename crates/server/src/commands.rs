//! One function per CLI subcommand.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use nvr_report_core::{
    list_service_requests,
    submission::{incident_times, Watermark},
    Config, EventStore, ReportsByDate, ResolutionSummary,
};
use nvr_report_server::context::{artifact_layout, Services};

/// Accepted local formats for `--before`, tried in order.
const LOCAL_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%m/%d/%Y %I:%M %p"];

pub fn timezone(config: &Config) -> Result<Tz> {
    config
        .submission
        .timezone
        .parse()
        .map_err(|_| anyhow!("Unknown time zone: {}", config.submission.timezone))
}

/// Parse an RFC 3339 timestamp, or a local time in `zone`.
pub fn parse_before(value: &str, zone: Tz) -> Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return zone
                .from_local_datetime(&naive)
                .single()
                .map(|local| local.with_timezone(&Utc))
                .ok_or_else(|| anyhow!("Ambiguous local time: {}", value));
        }
    }
    bail!("Invalid date: {}", value)
}

pub async fn build_db(config: &Config) -> Result<()> {
    let layout = artifact_layout(config)?;
    let path = config.storage.database_path();
    let store = EventStore::rebuild(&path, &layout)
        .await
        .with_context(|| format!("Failed to rebuild event store at {:?}", path))?;
    info!(events = store.len(), "Event store rebuilt");
    Ok(())
}

pub async fn seed_last_run_time(config: &Config) -> Result<()> {
    let watermark = Watermark::new(config.storage.watermark_path());
    let run = watermark
        .seed(Utc::now())
        .await
        .context("Failed to seed submission watermark")?;
    info!(last_run_time = %run.last_run_time, "Submission watermark ready");
    Ok(())
}

async fn last_run_time(services: &Services) -> Result<DateTime<Utc>> {
    let run = services
        .submission
        .watermark()
        .read()
        .await?
        .ok_or_else(|| anyhow!("No submission watermark, run seed-last-run-time first"))?;
    Ok(run.last_run_time)
}

pub async fn fetch_staged_clips(services: &Services, dry_run: bool) -> Result<()> {
    let after = last_run_time(services).await?;
    let report = services
        .ingestion
        .stage_clips(after, Some(Utc::now()), dry_run)
        .await?;
    if dry_run {
        for id in &report.would_download {
            println!("would download {}", id);
        }
    }
    info!(
        fetched = report.fetched,
        downloaded = report.downloaded.len(),
        already_staged = report.already_staged.len(),
        "Staged clips"
    );
    Ok(())
}

pub async fn check_overlapping(services: &Services) -> Result<()> {
    let after = last_run_time(services).await?;
    let deleted = services
        .overlaps
        .resolve_overlaps(after, Some(Utc::now()))
        .await?;
    for deletion in &deleted {
        println!("{} {}", deletion.event_id, deletion.reason.label());
    }
    Ok(())
}

pub async fn submit(
    services: &Services,
    zone: Tz,
    before: Option<&str>,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let pipeline = &services.submission;
    pipeline.watermark().seed(Utc::now()).await?;

    let before = match before {
        Some(value) => parse_before(value, zone)?,
        None => {
            let (run, events) = pipeline.pending_events().await?;
            info!(last_run_time = %incident_times(run.last_run_time, zone).1, "Last run time");
            let Some(latest) = events.last() else {
                bail!("No events found");
            };
            let latest_time = latest.timestamp();
            info!(latest = %incident_times(latest_time, zone).1, "Latest event");
            if !yes && !confirm("submit? [y/N] ").await? {
                info!("Exiting");
                return Ok(());
            }
            latest_time
        }
    };

    let report = pipeline.run_batch(Some(before), dry_run).await?;
    for result in &report.results {
        println!("{} {}", result.event_id, result.outcome.label());
    }
    info!(
        fetched = report.fetched,
        submitted = report.submitted().len(),
        canceled = report.canceled,
        "Submission finished"
    );
    Ok(())
}

async fn confirm(prompt: &str) -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(answer.trim() == "y")
}

pub async fn check_resolution(services: &Services) -> Result<()> {
    let report = services.resolution.check_all().await?;
    for id in &report.resolved {
        println!("resolved {}", id);
    }
    Ok(())
}

pub fn list_requests(services: &Services) -> Result<()> {
    print!("{}", list_service_requests(&services.store.states()));
    Ok(())
}

pub fn reports_by_date(services: &Services) -> Result<()> {
    print!("{}", ReportsByDate::from_states(&services.store.states()).render());
    Ok(())
}

pub fn resolution_summary(services: &Services) -> Result<()> {
    print!(
        "{}",
        ResolutionSummary::from_states(&services.store.states()).render()
    );
    Ok(())
}

pub async fn clean_staged_clips(services: &Services) -> Result<()> {
    let removed = services.ingestion.clean_staged_clips().await?;
    info!(removed = removed.len(), "Staging directories removed");
    Ok(())
}

pub async fn upload_to_storage(services: &Services, event_id: &str) -> Result<()> {
    if !services.store.exists(event_id) {
        bail!("Event {} not found", event_id);
    }
    let url = services.submission.upload_to_storage(event_id).await?;
    println!("{}", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEW_YORK: Tz = chrono_tz::America::New_York;

    #[test]
    fn test_parse_before_rfc3339() {
        let time = parse_before("2024-01-15T14:05:00Z", NEW_YORK).unwrap();
        assert_eq!(time.timestamp(), 1_705_327_500);
    }

    #[test]
    fn test_parse_before_local_time() {
        // 9:05 AM EST is 14:05 UTC.
        let time = parse_before("2024-01-15 09:05", NEW_YORK).unwrap();
        assert_eq!(time.timestamp(), 1_705_327_500);

        let time = parse_before("01/15/2024 9:05 AM", NEW_YORK).unwrap();
        assert_eq!(time.timestamp(), 1_705_327_500);
    }

    #[test]
    fn test_parse_before_rejects_garbage() {
        assert!(parse_before("next tuesday", NEW_YORK).is_err());
    }
}
