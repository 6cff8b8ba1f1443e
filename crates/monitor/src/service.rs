//! Lifecycle wrapper around the optional monitoring client.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use svcboot_domain::ObservabilityConfig;
use tracing::{info, warn};

use crate::{
    client::{ClientSettings, LogRecord, MonitoringClient, MonitoringConnector, Transaction},
    log_api::LogApiConnector,
};

/// Upper bound on how long [`MonitoringService::shutdown`] waits for the
/// client to flush.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Either a live client or nothing. Every operation on `Absent` is a no-op,
/// so call sites never branch on whether monitoring is configured.
#[derive(Clone, Default)]
pub enum MonitoringHandle {
    #[default]
    Absent,
    Present(Arc<dyn MonitoringClient>),
}

impl MonitoringHandle {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn client(&self) -> Option<&Arc<dyn MonitoringClient>> {
        match self {
            Self::Present(client) => Some(client),
            Self::Absent => None,
        }
    }

    pub fn start_transaction(&self, name: &str) -> Option<Transaction> {
        self.client().map(|client| client.start_transaction(name))
    }

    pub fn record_log(&self, record: LogRecord) {
        if let Some(client) = self.client() {
            client.record_log(record);
        }
    }
}

impl fmt::Debug for MonitoringHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Present(client) => f.debug_tuple("Present").field(&client.app_name()).finish(),
        }
    }
}

/// Owns the monitoring client for the lifetime of the process.
#[derive(Debug)]
pub struct MonitoringService {
    handle: MonitoringHandle,
    shut_down: AtomicBool,
}

impl MonitoringService {
    /// Connects the default log-API client when a license key is configured.
    /// Never fails: a missing key or a construction error both yield a
    /// service with an absent handle.
    pub fn new(config: &ObservabilityConfig) -> Self {
        Self::with_connector(config, &LogApiConnector)
    }

    pub fn with_connector<C>(config: &ObservabilityConfig, connector: &C) -> Self
    where
        C: MonitoringConnector + ?Sized,
    {
        if config.monitoring.license_key.is_empty() {
            info!("monitoring license key not set; monitoring disabled");
            return Self::disabled();
        }

        let settings = ClientSettings::from_config(config);
        match connector.connect(&settings) {
            Ok(client) => {
                info!(app = %settings.app_name, "monitoring client initialized");
                Self::from_client(client)
            }
            Err(err) => {
                warn!(error = %err, "failed to initialize monitoring; continuing without it");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            handle: MonitoringHandle::Absent,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn from_client(client: Arc<dyn MonitoringClient>) -> Self {
        Self {
            handle: MonitoringHandle::Present(client),
            shut_down: AtomicBool::new(false),
        }
    }

    /// The client handle. Ownership stays here; holders must not shut the
    /// client down themselves.
    pub fn handle(&self) -> &MonitoringHandle {
        &self.handle
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_present()
    }

    /// Flushes and closes the client, bounded by [`SHUTDOWN_TIMEOUT`].
    /// Only the first call does any work.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(client) = self.handle.client() {
            client.shutdown(SHUTDOWN_TIMEOUT);
        }
    }
}
