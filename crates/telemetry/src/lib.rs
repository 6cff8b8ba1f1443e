//! Logger construction for the service.
//!
//! [`build_logger`] picks a severity threshold and a writer from
//! [`ObservabilityConfig`](svcboot_domain::ObservabilityConfig): JSON lines on
//! stdout (mirrored to monitoring when a live client is supplied) in
//! production, a timestamped console renderer everywhere else.
//! [`with_trace`] derives request-scoped loggers carrying trace ids.

mod forwarding;
mod json;
mod logger;
mod query;
mod trace;


pub use forwarding::{record_from_json_line, ForwardingLine, ForwardingWriter};
pub use json::FlatJson;
pub use logger::{
    build_logger, build_logger_for, parse_level, Logger, LoggerFactory, WriterKind, TIME_FORMAT,
};
pub use query::{truncate_statement, QueryLogLevel, QueryLogger, MAX_STATEMENT_LEN};
pub use trace::with_trace;
