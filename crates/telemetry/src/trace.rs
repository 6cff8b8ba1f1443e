//! Request-scoped loggers carrying distributed-tracing ids.

use svcboot_monitor::Transaction;

use crate::logger::Logger;

/// Returns a logger whose records also carry `trace.id` and `span.id` from
/// `transaction`. Without a transaction the input logger is returned as is.
/// `logger` itself is never modified.
pub fn with_trace(logger: &Logger, transaction: Option<&Transaction>) -> Logger {
    let Some(transaction) = transaction else {
        return logger.clone();
    };

    let metadata = transaction.trace_metadata();
    logger.derive(|parent| {
        tracing::info_span!(
            parent: parent,
            "trace",
            trace.id = %metadata.trace_id,
            span.id = %metadata.span_id,
        )
    })
}
