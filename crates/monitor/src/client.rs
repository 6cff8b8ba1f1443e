//! The narrow capability the rest of the service uses to talk to a
//! monitoring backend, plus the value types that cross it.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use svcboot_domain::ObservabilityConfig;
use thiserror::Error;

/// Correlation ids of a transaction. Both are empty when distributed
/// tracing is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceMetadata {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceMetadata {
    /// Random W3C-sized ids: 16-byte trace id, 8-byte span id, hex encoded.
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut trace = [0u8; 16];
        let mut span = [0u8; 8];
        getrandom::fill(&mut trace)?;
        getrandom::fill(&mut span)?;
        Ok(Self {
            trace_id: hex::encode(trace),
            span_id: hex::encode(span),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.trace_id.is_empty() && self.span_id.is_empty()
    }
}

/// A unit of work tracked by the monitoring backend, typically one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    name: String,
    metadata: TraceMetadata,
    started_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(name: impl Into<String>, metadata: TraceMetadata) -> Self {
        Self {
            name: name.into(),
            metadata,
            started_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trace_metadata(&self) -> &TraceMetadata {
        &self.metadata
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// One log line mirrored to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub level: String,
    pub message: String,
    pub attributes: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            level: level.into(),
            message: message.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Live session with a monitoring backend. Implementations must be cheap to
/// call from any thread and must never block the caller on network I/O,
/// except for [`MonitoringClient::shutdown`].
pub trait MonitoringClient: Send + Sync {
    fn app_name(&self) -> &str;

    fn start_transaction(&self, name: &str) -> Transaction;

    /// Queues a record for forwarding. Failures are swallowed.
    fn record_log(&self, record: LogRecord);

    /// Flushes pending data, waiting at most `timeout`.
    fn shutdown(&self, timeout: Duration);
}

/// Everything a client needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub app_name: String,
    pub license_key: String,
    pub log_forwarding: bool,
    pub distributed_tracing: bool,
    pub debug_logging: bool,
    pub endpoint: Option<String>,
}

impl ClientSettings {
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        let monitoring = &config.monitoring;
        let endpoint = monitoring.endpoint.trim();
        Self {
            app_name: config.service_name.clone(),
            license_key: monitoring.license_key.clone(),
            log_forwarding: monitoring.app_log_forwarding_enabled,
            distributed_tracing: monitoring.distributed_tracing_enabled,
            debug_logging: monitoring.debug_logging,
            endpoint: (!endpoint.is_empty()).then(|| endpoint.to_string()),
        }
    }
}

/// Opens client sessions; lets tests and alternative backends replace the
/// default HTTP client.
pub trait MonitoringConnector {
    fn connect(
        &self,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn MonitoringClient>, MonitoringInitError>;
}

/// Client construction failures. Callers treat every variant as non-fatal.
#[derive(Debug, Error)]
pub enum MonitoringInitError {
    #[error("monitoring app name is required")]
    MissingAppName,
    #[error("license key must be {expected} characters, got {actual}")]
    InvalidLicenseKey { expected: usize, actual: usize },
    #[error("failed to spawn forwarding worker: {0}")]
    Worker(#[from] std::io::Error),
}
