use std::sync::Arc;

use channelscout_core::{Config, DiscoveryRunner, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    runner: Arc<DiscoveryRunner>,
}

impl AppState {
    pub fn new(config: Config, runner: Arc<DiscoveryRunner>) -> Self {
        Self { config, runner }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn runner(&self) -> &Arc<DiscoveryRunner> {
        &self.runner
    }
}
