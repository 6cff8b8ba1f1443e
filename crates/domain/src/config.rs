//! Environment-driven service configuration shared by all binaries.

use std::{env, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::env::{self as source, take_section, EnvSource, ENV_PREFIX};

/// Variable that disables `.env` hydration (CI, tests, containers).
pub const SKIP_DOTENV_VAR: &str = "BOILERPLATE_SKIP_DOTENV";

/// Root business configuration. A value of this type only exists once every
/// mandatory field has been populated.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct Config {
    #[validate(nested)]
    pub primary: Primary,
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub auth: AuthConfig,
    #[validate(nested)]
    pub cache: CacheConfig,
    #[validate(nested)]
    pub integration: IntegrationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct Primary {
    #[validate(length(min = 1))]
    pub env: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub port: String,
    /// Seconds.
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub read_timeout: u64,
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub write_timeout: u64,
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub idle_timeout: u64,
    #[serde(deserialize_with = "source::list")]
    #[validate(length(min = 1))]
    pub cors_allowed_origin: Vec<String>,
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub user: String,
    /// Optional; local databases commonly run without one.
    pub password: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub ssl_mode: String,
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub max_open_conns: u32,
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub max_idle_conns: u32,
    /// Seconds.
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub conn_max_lifetime: u64,
    /// Seconds.
    #[serde(deserialize_with = "source::from_str")]
    #[validate(range(min = 1))]
    pub conn_max_idle_time: u64,
}

impl DatabaseConfig {
    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime)
    }

    pub fn conn_max_idle_time(&self) -> Duration {
        Duration::from_secs(self.conn_max_idle_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct AuthConfig {
    #[validate(length(min = 1))]
    pub secret_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    #[validate(length(min = 1))]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct IntegrationConfig {
    #[validate(length(min = 1))]
    pub resend_api_key: String,
}

impl Config {
    /// Reads every `BOILERPLATE_`-prefixed process variable, then
    /// materializes and validates the configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let source = EnvSource::from_env(ENV_PREFIX)?;
        Self::from_source(&source)
    }

    /// Materializes and validates a configuration from an explicit source.
    /// Unknown keys are ignored; missing keys stay zero and are then caught
    /// by validation.
    pub fn from_source(source: &EnvSource) -> Result<Self, ConfigError> {
        let mut tree = source.tree();
        let config = Self {
            primary: take_section(&mut tree, "primary")?,
            server: take_section(&mut tree, "server")?,
            database: take_section(&mut tree, "database")?,
            auth: take_section(&mut tree, "auth")?,
            cache: take_section(&mut tree, "cache")?,
            integration: take_section(&mut tree, "integration")?,
        };

        config.validate().map_err(ConfigError::from_validation)?;
        Ok(config)
    }

    pub fn env(&self) -> &str {
        &self.primary.env
    }
}

/// Loads `.env` into the process environment when present. A missing file
/// is not an error.
pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os(SKIP_DOTENV_VAR).is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(ConfigError::Load {
                reason: format!("failed to load .env file: {err}"),
            })
        }
    }

    Ok(())
}

/// Errors emitted while reading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load environment: {reason}")]
    Load { reason: String },
    #[error("could not parse `{key}`: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config validation failed: `{field}` is required")]
    Validation { field: String, missing: Vec<String> },
}

impl ConfigError {
    fn from_validation(errors: ValidationErrors) -> Self {
        let mut missing = Vec::new();
        collect_violations(&errors, "", &mut missing);
        missing.sort();
        let field = missing.first().cloned().unwrap_or_default();
        Self::Validation { field, missing }
    }

    /// Dotted path of the offending key when the error can name one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Parse { key, .. } => Some(key),
            Self::Load { .. } => None,
        }
    }
}

fn collect_violations(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(_) => out.push(path),
            ValidationErrorsKind::Struct(inner) => collect_violations(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_violations(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}
