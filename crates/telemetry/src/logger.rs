//! Logger construction: severity mapping, writer selection and the
//! [`Logger`] value every component logs through.

use std::{
    backtrace::Backtrace,
    error::Error as StdError,
    future::Future,
    io::{self, IsTerminal},
};

use svcboot_domain::ObservabilityConfig;
use svcboot_monitor::MonitoringService;
use tracing::{
    dispatcher,
    instrument::{Instrument, Instrumented, WithDispatch, WithSubscriber},
    level_filters::LevelFilter,
    Dispatch, Metadata, Span,
};
use tracing_subscriber::{
    filter::{filter_fn, FilterFn},
    fmt::{self, format::JsonFields, time::ChronoLocal, writer::BoxMakeWriter, MakeWriter},
    layer::SubscriberExt,
    Layer, Registry,
};

use crate::{forwarding::ForwardingWriter, json::FlatJson};

/// Timestamp layout shared by the console and JSON writers.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Maps a configured level onto a severity threshold. Anything outside
/// `debug/info/warn/error` degrades to `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level {
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Which renderer a factory will pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    /// One JSON object per line, optionally mirrored to monitoring.
    Structured,
    /// Human-readable, timestamped, column-aligned lines.
    Console,
}

/// Builds a [`Logger`] from observability settings. Never fails; unknown
/// levels or formats fall back to `info` and the console renderer.
pub struct LoggerFactory<'a> {
    config: &'a ObservabilityConfig,
    monitoring: Option<&'a MonitoringService>,
    writer: Option<BoxMakeWriter>,
    time_format: String,
}

impl<'a> LoggerFactory<'a> {
    pub fn new(config: &'a ObservabilityConfig) -> Self {
        Self {
            config,
            monitoring: None,
            writer: None,
            time_format: TIME_FORMAT.to_string(),
        }
    }

    pub fn monitoring(mut self, monitoring: Option<&'a MonitoringService>) -> Self {
        self.monitoring = monitoring;
        self
    }

    /// Replaces stdout as the local sink.
    pub fn writer<W>(mut self, writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        self.writer = Some(BoxMakeWriter::new(writer));
        self
    }

    /// `strftime` layout for record timestamps.
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    pub fn writer_kind(&self) -> WriterKind {
        if self.config.is_production() && self.config.is_structured_format() {
            WriterKind::Structured
        } else {
            WriterKind::Console
        }
    }

    pub fn build(self) -> Logger {
        let level = parse_level(self.config.effective_log_level());
        let kind = self.writer_kind();
        let ansi = self.writer.is_none() && io::stdout().is_terminal();
        let base = self.writer.unwrap_or_else(|| BoxMakeWriter::new(io::stdout));
        let timer = ChronoLocal::new(self.time_format);

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match kind {
            WriterKind::Structured => {
                let forward_to = self
                    .monitoring
                    .and_then(|service| service.handle().client().cloned());
                let writer = match forward_to {
                    Some(client) => BoxMakeWriter::new(ForwardingWriter::new(base, client)),
                    None => base,
                };
                fmt::layer()
                    .fmt_fields(JsonFields::new())
                    .event_format(FlatJson::new(timer))
                    .with_writer(writer)
                    .with_filter(event_threshold(level))
                    .boxed()
            }
            WriterKind::Console => fmt::layer()
                .with_timer(timer)
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(base)
                .with_filter(event_threshold(level))
                .boxed(),
        };

        let dispatch = Dispatch::new(Registry::default().with(layer));
        let span = dispatcher::with_default(&dispatch, || {
            tracing::info_span!(
                "app",
                service = %self.config.service_name,
                environment = %self.config.environment,
            )
        });

        Logger {
            dispatch,
            span,
            level,
            capture_stack: !self.config.is_production(),
        }
    }
}

/// Spans always pass so bound fields survive any threshold.
fn event_threshold(level: LevelFilter) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
    filter_fn(move |meta| meta.is_span() || *meta.level() <= level)
}

/// Builds the process logger, forwarding to `monitoring` when it is live.
pub fn build_logger(config: &ObservabilityConfig, monitoring: Option<&MonitoringService>) -> Logger {
    LoggerFactory::new(config).monitoring(monitoring).build()
}

/// Shorthand for callers that only know a level and whether they run in
/// production.
pub fn build_logger_for(level: &str, is_production: bool) -> Logger {
    let mut config = ObservabilityConfig::default();
    config.logging.level = level.to_string();
    config.environment = if is_production { "prod" } else { "dev" }.to_string();
    build_logger(&config, None)
}

/// A structured sink bound to `service`/`environment`.
///
/// The logger owns its own dispatcher and never touches the global default,
/// so any number can coexist. Clones share the sink; derived loggers
/// ([`crate::with_trace`], [`Logger::with_component`]) add fields without
/// affecting the logger they came from.
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
    span: Span,
    level: LevelFilter,
    capture_stack: bool,
}

impl Logger {
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Whether [`Logger::error_with`] attaches a backtrace.
    pub fn captures_stack(&self) -> bool {
        self.capture_stack
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Runs `f` with this logger as the current sink, so plain `tracing`
    /// macros inside it carry the bound fields.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, || self.span.in_scope(f))
    }

    /// Attaches this logger to a future for every poll.
    pub fn instrument<F: Future>(&self, future: F) -> WithDispatch<Instrumented<F>> {
        future
            .instrument(self.span.clone())
            .with_subscriber(self.dispatch.clone())
    }

    pub fn debug(&self, message: &str) {
        self.in_scope(|| tracing::debug!("{}", message));
    }

    pub fn info(&self, message: &str) {
        self.in_scope(|| tracing::info!("{}", message));
    }

    pub fn warn(&self, message: &str) {
        self.in_scope(|| tracing::warn!("{}", message));
    }

    pub fn error(&self, message: &str) {
        self.in_scope(|| tracing::error!("{}", message));
    }

    /// Logs `err` at error level, with a backtrace outside production.
    pub fn error_with(&self, err: &dyn StdError, message: &str) {
        self.in_scope(|| {
            if self.capture_stack {
                let stack = Backtrace::force_capture();
                tracing::error!(error = %err, stack = %stack, "{}", message);
            } else {
                tracing::error!(error = %err, "{}", message);
            }
        });
    }

    /// Derived logger tagged with `component`.
    pub fn with_component(&self, component: &str) -> Logger {
        self.derive(|parent| tracing::info_span!(parent: parent, "component", component = %component))
    }

    pub(crate) fn derive(&self, make_span: impl FnOnce(&Span) -> Span) -> Logger {
        let span = dispatcher::with_default(&self.dispatch, || make_span(&self.span));
        Logger {
            span,
            ..self.clone()
        }
    }
}
