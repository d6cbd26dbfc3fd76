use std::sync::Arc;

use nvr_report_core::{Config, SanitizedConfig};

use crate::context::Services;

/// Shared application state
pub struct AppState {
    config: Config,
    services: Arc<Services>,
}

impl AppState {
    pub fn new(config: Config, services: Arc<Services>) -> Self {
        Self { config, services }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }
}
