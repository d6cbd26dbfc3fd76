mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nvr_report_core::{load_config, validate_config, Config};
use nvr_report_server::api::create_router;
use nvr_report_server::context::{Capabilities, Services};
use nvr_report_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "nvr-report", version, about = "Review NVR events and file them as civic complaints")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "NVR_REPORT_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Rebuild the event store from the artifacts on disk
    BuildDb,
    /// Download staged clips for every event since the watermark
    FetchStagedClips {
        /// Only report what would be downloaded
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete too-long and overlapping events since the watermark from the NVR
    CheckOverlapping,
    /// Create the submission watermark at the current time if it is missing
    SeedLastRunTime,
    /// Submit reviewed events since the watermark
    Submit {
        /// Last event time to submit, RFC 3339 or local "YYYY-MM-DD HH:MM"
        #[arg(long)]
        before: Option<String>,
        /// Prepare complaints without submitting them
        #[arg(long)]
        dry_run: bool,
        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Poll the status API for every open service request
    CheckResolution,
    /// Print submitted requests as CSV
    ListRequests,
    /// Print request numbers grouped by incident date
    ReportsByDate,
    /// Print event counts per resolution action
    ResolutionSummary,
    /// Remove every staging directory
    CleanStagedClips,
    /// Upload one event's clip to object storage
    UploadToStorage {
        /// Event id
        event_id: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(version = VERSION, "nvr-report starting");

    // Load configuration
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(config_hash = &config_hash[..16], "Configuration loaded successfully");
    info!("Events directory: {:?}", config.storage.events_dir);
    info!("Staging directory: {:?}", config.storage.staging_dir);

    // Commands that never touch the external systems.
    match &cli.command {
        Command::BuildDb => return commands::build_db(&config).await,
        Command::SeedLastRunTime => return commands::seed_last_run_time(&config).await,
        _ => {}
    }

    let capabilities = Capabilities::http(&config)?;
    let services = Arc::new(Services::build(&config, capabilities).await?);

    if let Command::Serve = cli.command {
        return serve(config, services).await;
    }

    let timezone = commands::timezone(&config)?;
    let work = async {
        match cli.command {
            Command::FetchStagedClips { dry_run } => {
                commands::fetch_staged_clips(&services, dry_run).await
            }
            Command::CheckOverlapping => commands::check_overlapping(&services).await,
            Command::Submit {
                before,
                dry_run,
                yes,
            } => commands::submit(&services, timezone, before.as_deref(), dry_run, yes).await,
            Command::CheckResolution => commands::check_resolution(&services).await,
            Command::ListRequests => commands::list_requests(&services),
            Command::ReportsByDate => commands::reports_by_date(&services),
            Command::ResolutionSummary => commands::resolution_summary(&services),
            Command::CleanStagedClips => commands::clean_staged_clips(&services).await,
            Command::UploadToStorage { event_id } => {
                commands::upload_to_storage(&services, &event_id).await
            }
            Command::Serve | Command::BuildDb | Command::SeedLastRunTime => Ok(()),
        }
    };

    tokio::select! {
        result = work => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, saving event store");
            services.submission.cancel();
            services.store.save_blocking().context("Failed to save event store")?;
            std::process::exit(130);
        }
    }
}

async fn serve(config: Config, services: Arc<Services>) -> Result<()> {
    services
        .submission
        .watermark()
        .seed(chrono::Utc::now())
        .await
        .context("Failed to seed submission watermark")?;

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&services)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    services.submission.cancel();
    services
        .store
        .save()
        .await
        .context("Failed to save event store")?;
    info!("Event store saved");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
