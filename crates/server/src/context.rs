//! Construction of the core services from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use nvr_report_core::{
    ingestion::ClipSizePolicy,
    resolution::{HttpStatusApi, StatusApi},
    submission::{
        ComplaintPortal, HttpObjectStorage, HttpPortalClient, ObjectStorage, Watermark,
    },
    ArtifactLayout, Config, EventSource, EventStore, FrigateClient, IngestionPipeline,
    OverlapResolver, ResolutionTracker, ReviewGate, SubmissionPipeline, SubmissionServices,
};

/// External systems the services talk to.
pub struct Capabilities {
    pub source: Arc<dyn EventSource>,
    pub portal: Arc<dyn ComplaintPortal>,
    pub object_storage: Option<Arc<dyn ObjectStorage>>,
    pub status_api: Arc<dyn StatusApi>,
}

impl Capabilities {
    /// HTTP clients for every configured endpoint.
    pub fn http(config: &Config) -> Result<Self> {
        info!("Initializing NVR client at {}", config.source.url);
        let source = FrigateClient::new(config.source.clone())
            .context("Failed to create NVR client")?;

        info!("Initializing complaint portal client at {}", config.portal.url);
        let portal = HttpPortalClient::new(config.portal.clone())
            .context("Failed to create complaint portal client")?;

        let object_storage: Option<Arc<dyn ObjectStorage>> = match &config.object_storage {
            Some(storage_config) => {
                info!("Initializing object storage at {}", storage_config.endpoint);
                Some(Arc::new(
                    HttpObjectStorage::new(storage_config.clone())
                        .context("Failed to create object storage client")?,
                ))
            }
            None => {
                info!("No object storage configured, attachment fallback disabled");
                None
            }
        };

        let status_api = HttpStatusApi::new(config.resolution.clone())
            .context("Failed to create status API client")?;

        Ok(Self {
            source: Arc::new(source),
            portal: Arc::new(portal),
            object_storage,
            status_api: Arc::new(status_api),
        })
    }
}

/// Everything the commands and the HTTP API operate on.
pub struct Services {
    pub layout: ArtifactLayout,
    pub store: Arc<EventStore>,
    pub ingestion: Arc<IngestionPipeline>,
    pub overlaps: OverlapResolver,
    pub reviews: ReviewGate,
    pub submission: Arc<SubmissionPipeline>,
    pub resolution: ResolutionTracker,
}

impl Services {
    /// Load the event store and wire the pipelines around it.
    pub async fn build(config: &Config, capabilities: Capabilities) -> Result<Self> {
        let layout = artifact_layout(config)?;

        let database_path = config.storage.database_path();
        let store = EventStore::load(&database_path, &layout)
            .await
            .with_context(|| format!("Failed to load event store from {:?}", database_path))?;
        info!(events = store.len(), "Event store loaded");
        let store = Arc::new(store);

        let page_size = config.source.page_size;
        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::clone(&capabilities.source),
            Arc::clone(&store),
            layout.clone(),
            &config.ingestion,
            page_size,
        ));
        let overlaps = OverlapResolver::new(
            Arc::clone(&capabilities.source),
            config.overlap.clone(),
            page_size,
        );
        let reviews = ReviewGate::new(&config.review, layout.clone());

        let services = SubmissionServices {
            ingestion: Arc::clone(&ingestion),
            store: Arc::clone(&store),
            reviews: reviews.clone(),
            portal: capabilities.portal,
            object_storage: capabilities.object_storage,
            watermark: Watermark::new(config.storage.watermark_path()),
            overlap: config.overlap.clone(),
            clip_policy: ClipSizePolicy::from_config(&config.ingestion),
            page_size,
        };
        let submission = Arc::new(
            SubmissionPipeline::new(&config.submission, services)
                .context("Failed to create submission pipeline")?,
        );

        let resolution = ResolutionTracker::new(
            capabilities.status_api,
            Arc::clone(&store),
            layout.clone(),
            &config.resolution,
        );

        Ok(Self {
            layout,
            store,
            ingestion,
            overlaps,
            reviews,
            submission,
            resolution,
        })
    }
}

pub fn artifact_layout(config: &Config) -> Result<ArtifactLayout> {
    ArtifactLayout::new(&config.storage.events_dir, &config.storage.staging_dir)
        .context("Invalid storage directories")
}
