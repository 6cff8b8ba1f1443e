use std::sync::Arc;

use svcboot_domain::{Config, ObservabilityConfig};
use svcboot_monitor::MonitoringService;
use svcboot_telemetry::Logger;

/// Everything produced by a successful bootstrap.
#[derive(Clone)]
pub struct AppState {
    config: Config,
    observability: ObservabilityConfig,
    logger: Logger,
    monitoring: Arc<MonitoringService>,
}

impl AppState {
    pub fn new(
        config: Config,
        observability: ObservabilityConfig,
        logger: Logger,
        monitoring: Arc<MonitoringService>,
    ) -> Self {
        Self {
            config,
            observability,
            logger,
            monitoring,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn observability(&self) -> &ObservabilityConfig {
        &self.observability
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn monitoring(&self) -> &Arc<MonitoringService> {
        &self.monitoring
    }
}
