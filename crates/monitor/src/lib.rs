//! Monitoring backend integration: the [`MonitoringService`] lifecycle
//! wrapper, the [`MonitoringClient`] capability it exposes, and the default
//! HTTP log-forwarding client.

pub mod client;
pub mod log_api;
pub mod service;
mod worker;

pub use client::{
    ClientSettings, LogRecord, MonitoringClient, MonitoringConnector, MonitoringInitError,
    TraceMetadata, Transaction,
};
pub use log_api::{LogApiClient, LogApiConnector};
pub use service::{MonitoringHandle, MonitoringService, SHUTDOWN_TIMEOUT};
