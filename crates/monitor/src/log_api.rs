//! Default [`MonitoringClient`]: forwards log records to an HTTP log-ingest
//! API from a dedicated worker thread.

use std::{
    fmt,
    io::{self, Write},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

use metrics::counter;

use crate::{
    client::{
        ClientSettings, LogRecord, MonitoringClient, MonitoringConnector, MonitoringInitError,
        TraceMetadata, Transaction,
    },
    worker::{run_forwarder, ForwarderConfig},
};

pub const DEFAULT_ENDPOINT: &str = "https://log-api.newrelic.com/log/v1";

/// License keys issued by the backend are always this long.
pub const LICENSE_KEY_LEN: usize = 40;

/// Records buffered between the logging call sites and the worker.
pub const QUEUE_CAPACITY: usize = 1024;

/// Connects [`LogApiClient`] sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogApiConnector;

impl MonitoringConnector for LogApiConnector {
    fn connect(
        &self,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn MonitoringClient>, MonitoringInitError> {
        let client = LogApiClient::start(settings.clone())?;
        Ok(Arc::new(client))
    }
}

/// Where the client's own debug output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Diagnostics {
    Silent,
    Stdout,
}

impl Diagnostics {
    pub(crate) fn emit(self, message: fmt::Arguments<'_>) {
        if self == Self::Stdout {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "monitoring: {message}");
        }
    }
}

pub struct LogApiClient {
    settings: ClientSettings,
    sender: Mutex<Option<SyncSender<LogRecord>>>,
    done: Mutex<Option<Receiver<()>>>,
    dropped: AtomicU64,
    diagnostics: Diagnostics,
}

impl LogApiClient {
    /// Validates `settings` and spawns the forwarding worker.
    pub fn start(settings: ClientSettings) -> Result<Self, MonitoringInitError> {
        if settings.app_name.trim().is_empty() {
            return Err(MonitoringInitError::MissingAppName);
        }
        if settings.license_key.len() != LICENSE_KEY_LEN {
            return Err(MonitoringInitError::InvalidLicenseKey {
                expected: LICENSE_KEY_LEN,
                actual: settings.license_key.len(),
            });
        }

        let diagnostics = if settings.debug_logging {
            Diagnostics::Stdout
        } else {
            Diagnostics::Silent
        };

        let (sender, receiver) = mpsc::sync_channel(QUEUE_CAPACITY);
        let (done_tx, done_rx) = mpsc::channel();
        let forwarder = ForwarderConfig {
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            license_key: settings.license_key.clone(),
            app_name: settings.app_name.clone(),
            diagnostics,
        };

        thread::Builder::new()
            .name("monitoring-forwarder".into())
            .spawn(move || {
                run_forwarder(forwarder, receiver);
                let _ = done_tx.send(());
            })?;

        diagnostics.emit(format_args!(
            "client started for {} (log forwarding: {}, distributed tracing: {})",
            settings.app_name, settings.log_forwarding, settings.distributed_tracing
        ));

        Ok(Self {
            settings,
            sender: Mutex::new(Some(sender)),
            done: Mutex::new(Some(done_rx)),
            dropped: AtomicU64::new(0),
            diagnostics,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Records rejected at the queue: overflow, or logged after shutdown.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn drop_record(&self, reason: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        counter!("monitoring_log_records_dropped_total", "reason" => reason).increment(1);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MonitoringClient for LogApiClient {
    fn app_name(&self) -> &str {
        &self.settings.app_name
    }

    fn start_transaction(&self, name: &str) -> Transaction {
        if !self.settings.distributed_tracing {
            return Transaction::new(name, TraceMetadata::default());
        }

        let metadata = TraceMetadata::generate().unwrap_or_else(|err| {
            self.diagnostics
                .emit(format_args!("could not generate trace ids: {err}"));
            TraceMetadata::default()
        });
        Transaction::new(name, metadata)
    }

    fn record_log(&self, record: LogRecord) {
        if !self.settings.log_forwarding {
            return;
        }

        let guard = lock(&self.sender);
        let Some(sender) = guard.as_ref() else {
            self.drop_record("closed");
            return;
        };
        match sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.drop_record("queue_full"),
            Err(TrySendError::Disconnected(_)) => self.drop_record("closed"),
        }
    }

    fn shutdown(&self, timeout: Duration) {
        // Dropping the sender lets the worker drain and exit.
        drop(lock(&self.sender).take());

        let Some(done) = lock(&self.done).take() else {
            return;
        };
        let dropped = self.dropped_records();
        if dropped > 0 {
            self.diagnostics
                .emit(format_args!("{dropped} records dropped before shutdown"));
        }
        match done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.diagnostics.emit(format_args!("client shut down"));
            }
            Err(RecvTimeoutError::Timeout) => {
                self.diagnostics
                    .emit(format_args!("shutdown timed out after {timeout:?}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn settings() -> ClientSettings {
        ClientSettings {
            app_name: "svcboot-test".into(),
            license_key: "a".repeat(LICENSE_KEY_LEN),
            log_forwarding: true,
            distributed_tracing: true,
            debug_logging: false,
            // Nothing listens on the discard port; requests fail fast.
            endpoint: Some("http://127.0.0.1:9/log/v1".into()),
        }
    }

    #[test]
    fn rejects_malformed_license_key() {
        let mut settings = settings();
        settings.license_key = "short".into();
        let err = LogApiClient::start(settings).err().expect("must fail");
        assert!(matches!(
            err,
            MonitoringInitError::InvalidLicenseKey {
                expected: LICENSE_KEY_LEN,
                actual: 5
            }
        ));
    }

    #[test]
    fn rejects_missing_app_name() {
        let mut settings = settings();
        settings.app_name = " ".into();
        let err = LogApiClient::start(settings).err().expect("must fail");
        assert!(matches!(err, MonitoringInitError::MissingAppName));
    }

    #[test]
    fn transactions_carry_ids_only_with_tracing_enabled() {
        let client = LogApiClient::start(settings()).expect("client starts");
        let txn = client.start_transaction("GET /");
        assert_eq!(txn.trace_metadata().trace_id.len(), 32);
        client.shutdown(Duration::from_secs(10));

        let mut untraced = settings();
        untraced.distributed_tracing = false;
        let client = LogApiClient::start(untraced).expect("client starts");
        assert!(client.start_transaction("GET /").trace_metadata().is_empty());
        client.shutdown(Duration::from_secs(10));
    }

    #[test]
    fn shutdown_is_bounded_and_idempotent() {
        let client = LogApiClient::start(settings()).expect("client starts");
        for idx in 0..10 {
            client.record_log(LogRecord::new("info", format!("line {idx}")));
        }

        let started = Instant::now();
        client.shutdown(Duration::from_secs(10));
        assert!(started.elapsed() <= Duration::from_secs(11));

        client.record_log(LogRecord::new("info", "after shutdown"));
        client.shutdown(Duration::from_secs(10));
    }

    #[test]
    fn records_after_shutdown_are_counted_as_dropped() {
        let client = LogApiClient::start(settings()).expect("client starts");
        client.record_log(LogRecord::new("info", "queued"));
        assert_eq!(client.dropped_records(), 0);

        client.shutdown(Duration::from_secs(10));
        client.record_log(LogRecord::new("info", "late"));
        client.record_log(LogRecord::new("info", "later"));
        assert_eq!(client.dropped_records(), 2);
    }

    #[test]
    fn disabled_forwarding_drops_nothing() {
        let mut settings = settings();
        settings.log_forwarding = false;
        let client = LogApiClient::start(settings).expect("client starts");
        client.record_log(LogRecord::new("info", "ignored"));
        client.shutdown(Duration::from_secs(10));
        assert_eq!(client.dropped_records(), 0);
    }

    #[test]
    fn connector_produces_shared_client() {
        let client = LogApiConnector.connect(&settings()).expect("connects");
        assert_eq!(client.app_name(), "svcboot-test");
        client.shutdown(Duration::from_secs(10));
    }
}
