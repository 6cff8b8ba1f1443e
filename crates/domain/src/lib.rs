//! Configuration building blocks shared by every binary in the workspace.
//!
//! Two independent trees are materialized from `BOILERPLATE_`-prefixed
//! environment variables: [`Config`] for business settings (validated,
//! all-or-nothing) and [`ObservabilityConfig`] for logging and monitoring
//! (defaulted, validated on request).

pub mod config;
pub mod env;
pub mod observability;

pub use config::{hydrate_env_file, Config, ConfigError};
pub use env::{EnvSource, ENV_PREFIX};
pub use observability::{ObservabilityConfig, ObservabilityError};
