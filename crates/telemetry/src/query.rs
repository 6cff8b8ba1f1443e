//! Database query logging and the mapping onto the driver's own trace-level
//! vocabulary.

use std::{borrow::Cow, error::Error as StdError, time::Duration};

use svcboot_domain::ObservabilityConfig;
use tracing::level_filters::LevelFilter;

use crate::logger::Logger;

/// Statements longer than this are cut and suffixed with `...`.
pub const MAX_STATEMENT_LEN: usize = 200;

/// Trace levels understood by the database driver's logging hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryLogLevel {
    None = 0,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 6,
}

impl QueryLogLevel {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<LevelFilter> for QueryLogLevel {
    fn from(level: LevelFilter) -> Self {
        if level == LevelFilter::DEBUG {
            Self::Debug
        } else if level == LevelFilter::INFO {
            Self::Info
        } else if level == LevelFilter::WARN {
            Self::Warn
        } else if level == LevelFilter::ERROR {
            Self::Error
        } else {
            Self::None
        }
    }
}

/// Logs statements under `component=database`, escalating slow ones.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    logger: Logger,
    slow_threshold: Duration,
}

impl QueryLogger {
    pub fn new(base: &Logger, config: &ObservabilityConfig) -> Self {
        Self {
            logger: base.with_component("database"),
            slow_threshold: config.logging.slow_query_threshold,
        }
    }

    pub fn driver_level(&self) -> QueryLogLevel {
        self.logger.level().into()
    }

    /// A zero threshold disables slow-query escalation.
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        !self.slow_threshold.is_zero() && elapsed >= self.slow_threshold
    }

    pub fn record(&self, statement: &str, elapsed: Duration) {
        let statement = truncate_statement(statement);
        let elapsed_ms = elapsed.as_millis() as u64;
        let slow = self.is_slow(elapsed);
        self.logger.in_scope(|| {
            if slow {
                tracing::warn!(statement = %statement, elapsed_ms, "slow query");
            } else {
                tracing::debug!(statement = %statement, elapsed_ms, "query");
            }
        });
    }

    pub fn record_error(&self, statement: &str, err: &dyn StdError) {
        let statement = truncate_statement(statement);
        self.logger.in_scope(|| {
            tracing::error!(statement = %statement, error = %err, "query failed");
        });
    }
}

pub fn truncate_statement(statement: &str) -> Cow<'_, str> {
    if statement.len() <= MAX_STATEMENT_LEN {
        return Cow::Borrowed(statement);
    }

    let mut end = MAX_STATEMENT_LEN;
    while !statement.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}...", &statement[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_levels_follow_severity() {
        assert_eq!(QueryLogLevel::from(LevelFilter::DEBUG).code(), 6);
        assert_eq!(QueryLogLevel::from(LevelFilter::INFO).code(), 4);
        assert_eq!(QueryLogLevel::from(LevelFilter::WARN).code(), 3);
        assert_eq!(QueryLogLevel::from(LevelFilter::ERROR).code(), 2);
        assert_eq!(QueryLogLevel::from(LevelFilter::TRACE), QueryLogLevel::None);
        assert_eq!(QueryLogLevel::from(LevelFilter::OFF).code(), 0);
    }

    #[test]
    fn long_statements_are_truncated_on_char_boundary() {
        let short = "SELECT 1";
        assert!(matches!(truncate_statement(short), Cow::Borrowed("SELECT 1")));

        let long = format!("SELECT '{}'", "é".repeat(200));
        let cut = truncate_statement(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_STATEMENT_LEN + 3);
    }

    #[test]
    fn zero_threshold_never_escalates() {
        let mut config = ObservabilityConfig::default();
        config.logging.slow_query_threshold = Duration::ZERO;
        let logger = QueryLogger::new(&crate::build_logger(&config, None), &config);
        assert!(!logger.is_slow(Duration::from_secs(60)));

        let config = ObservabilityConfig::default();
        let logger = QueryLogger::new(&crate::build_logger(&config, None), &config);
        assert!(logger.is_slow(Duration::from_millis(100)));
        assert!(!logger.is_slow(Duration::from_millis(99)));
        assert_eq!(logger.driver_level(), QueryLogLevel::Info);
    }
}
