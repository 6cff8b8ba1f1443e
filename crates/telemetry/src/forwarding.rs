//! Writer adapter that mirrors every structured line to the monitoring
//! backend after it has been written locally.

use std::{
    io::{self, Write},
    sync::Arc,
};

use serde_json::Value;
use svcboot_monitor::{LogRecord, MonitoringClient};
use tracing_subscriber::fmt::MakeWriter;

/// Wraps a local [`MakeWriter`]; each record goes to the local sink first
/// and is handed to the client only once the line is complete.
pub struct ForwardingWriter<M> {
    inner: M,
    client: Arc<dyn MonitoringClient>,
}

impl<M> ForwardingWriter<M> {
    pub fn new(inner: M, client: Arc<dyn MonitoringClient>) -> Self {
        Self { inner, client }
    }
}

impl<'a, M> MakeWriter<'a> for ForwardingWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = ForwardingLine<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        ForwardingLine {
            inner: self.inner.make_writer(),
            line: Vec::new(),
            client: self.client.as_ref(),
        }
    }
}

/// Writer for a single record; forwards on drop.
pub struct ForwardingLine<'a, W: Write> {
    inner: W,
    line: Vec<u8>,
    client: &'a dyn MonitoringClient,
}

impl<W: Write> Write for ForwardingLine<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.line.extend_from_slice(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for ForwardingLine<'_, W> {
    fn drop(&mut self) {
        if let Some(record) = record_from_json_line(&self.line) {
            self.client.record_log(record);
        }
    }
}

/// Converts one JSON line from the structured writer into a [`LogRecord`].
/// Every field other than `level`, `message` and `timestamp` becomes an
/// attribute; anything that is not a JSON object is skipped.
pub fn record_from_json_line(line: &[u8]) -> Option<LogRecord> {
    let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(line) else {
        return None;
    };

    let level = match fields.remove("level") {
        Some(Value::String(level)) => level.to_ascii_lowercase(),
        _ => String::new(),
    };
    let message = match fields.remove("message") {
        Some(Value::String(message)) => message,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    fields.remove("timestamp");

    let mut record = LogRecord::new(level, message);
    record.attributes.extend(fields);

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_fields_into_attributes() {
        let line = br#"{"timestamp":"2024-01-01 00:00:00","level":"WARN","message":"slow","elapsed_ms":12,"service":"billing","environment":"prod","trace.id":"abc","span.id":"def"}
"#;
        let record = record_from_json_line(line).expect("parses");

        assert_eq!(record.level, "warn");
        assert_eq!(record.message, "slow");
        assert_eq!(record.attributes["service"], "billing");
        assert_eq!(record.attributes["environment"], "prod");
        assert_eq!(record.attributes["trace.id"], "abc");
        assert_eq!(record.attributes["span.id"], "def");
        assert_eq!(record.attributes["elapsed_ms"], 12);
        assert!(!record.attributes.contains_key("level"));
        assert!(!record.attributes.contains_key("message"));
        assert!(!record.attributes.contains_key("timestamp"));
    }

    #[test]
    fn skips_non_json_lines() {
        assert!(record_from_json_line(b"2024-01-01 INFO plain text").is_none());
        assert!(record_from_json_line(b"[1,2,3]").is_none());
        assert!(record_from_json_line(b"").is_none());
    }
}
