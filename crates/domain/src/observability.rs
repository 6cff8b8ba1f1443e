//! Logging, monitoring and health-check settings. Loaded independently of
//! [`Config`](crate::config::Config) because it has its own defaults and is
//! needed before the business configuration is known to be valid.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::{
    config::ConfigError,
    env::{self as source, take_section, EnvSource, ENV_PREFIX},
};

/// Environment value that switches the service into production behaviour.
pub const PRODUCTION_ENV: &str = "prod";

/// Log format selecting the machine-readable writer in production.
pub const STRUCTURED_FORMAT: &str = "json";

/// Severities accepted by [`ObservabilityConfig::validate`].
pub const VALID_LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Shortest interval/timeout accepted for health checks.
pub const MIN_HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub environment: String,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
    pub health_checks: HealthChecksConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    #[serde(with = "humantime_serde")]
    pub slow_query_threshold: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub license_key: String,
    #[serde(deserialize_with = "source::boolean")]
    pub app_log_forwarding_enabled: bool,
    #[serde(deserialize_with = "source::boolean")]
    pub distributed_tracing_enabled: bool,
    #[serde(deserialize_with = "source::boolean")]
    pub debug_logging: bool,
    /// Log ingestion endpoint; empty selects the client's default.
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HealthChecksConfig {
    #[serde(deserialize_with = "source::boolean")]
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(deserialize_with = "source::list")]
    pub checks: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "svcboot".to_string(),
            environment: "dev".to_string(),
            logging: LoggingConfig::default(),
            monitoring: MonitoringConfig::default(),
            health_checks: HealthChecksConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: STRUCTURED_FORMAT.to_string(),
            slow_query_threshold: Duration::from_millis(100),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            license_key: String::new(),
            app_log_forwarding_enabled: true,
            distributed_tracing_enabled: true,
            debug_logging: true,
            endpoint: String::new(),
        }
    }
}

impl Default for HealthChecksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            checks: vec!["database".to_string(), "cache".to_string()],
        }
    }
}

impl ObservabilityConfig {
    /// Overlays `BOILERPLATE_OBSERVABILITY.*` process variables on top of
    /// the defaults. Does not validate; call [`Self::validate`] for that.
    pub fn from_env() -> Result<Self, ConfigError> {
        let source = EnvSource::from_env(ENV_PREFIX)?;
        Self::from_source(&source)
    }

    pub fn from_source(source: &EnvSource) -> Result<Self, ConfigError> {
        let mut tree = source.tree();
        take_section(&mut tree, "observability")
    }

    pub fn validate(&self) -> Result<(), ObservabilityError> {
        if self.service_name.is_empty() {
            return Err(ObservabilityError::InvalidServiceName);
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ObservabilityError::InvalidLogLevel(
                self.logging.level.clone(),
            ));
        }

        for (field, value) in [
            ("health_checks.interval", self.health_checks.interval),
            ("health_checks.timeout", self.health_checks.timeout),
        ] {
            if value < MIN_HEALTH_CHECK_PERIOD {
                return Err(ObservabilityError::InvalidHealthCheck { field, value });
            }
        }

        Ok(())
    }

    /// The configured level, verbatim. Unknown strings are left for the
    /// logger factory to degrade.
    pub fn effective_log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION_ENV
    }

    pub fn is_structured_format(&self) -> bool {
        self.logging.format == STRUCTURED_FORMAT
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservabilityError {
    #[error("service name is required")]
    InvalidServiceName,
    #[error("invalid log level: {0} (must be one of: debug,info,warn,error)")]
    InvalidLogLevel(String),
    #[error("`{field}` must be at least 1s, got {value:?}")]
    InvalidHealthCheck {
        field: &'static str,
        value: Duration,
    },
}
