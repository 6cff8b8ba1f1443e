use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

use metrics::{counter, histogram};
use serde_json::json;

use crate::{client::LogRecord, log_api::Diagnostics};

/// Largest batch sent in a single request.
pub const MAX_BATCH: usize = 100;

/// How long a partial batch may wait before it is sent anyway.
pub const HARVEST_INTERVAL: Duration = Duration::from_secs(1);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct ForwarderConfig {
    pub endpoint: String,
    pub license_key: String,
    pub app_name: String,
    pub diagnostics: Diagnostics,
}

/// Drains `receiver` until every sender is gone, posting records in batches.
/// Runs on its own thread; blocking I/O here never reaches the log callers.
pub(crate) fn run_forwarder(config: ForwarderConfig, receiver: Receiver<LogRecord>) {
    // 在工作线程内部构建阻塞客户端，避免在异步运行时上下文中创建/销毁它。
    let http = match reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
    {
        Ok(http) => http,
        Err(err) => {
            config
                .diagnostics
                .emit(format_args!("http client unavailable, discarding logs: {err}"));
            // 继续消费队列直到关闭，保证 shutdown 能及时返回。
            let discarded = receiver.iter().count() as u64;
            counter!("monitoring_log_records_dropped_total", "reason" => "no_client")
                .increment(discarded);
            config
                .diagnostics
                .emit(format_args!("discarded {discarded} records without a client"));
            return;
        }
    };

    let mut batch = Vec::with_capacity(MAX_BATCH);
    loop {
        match receiver.recv_timeout(HARVEST_INTERVAL) {
            Ok(record) => {
                batch.push(record);
                if batch.len() >= MAX_BATCH {
                    send_batch(&http, &config, &mut batch);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !batch.is_empty() {
                    send_batch(&http, &config, &mut batch);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // 发送端已全部关闭：刷新剩余记录后退出。
                if !batch.is_empty() {
                    send_batch(&http, &config, &mut batch);
                }
                return;
            }
        }
    }
}

fn send_batch(
    http: &reqwest::blocking::Client,
    config: &ForwarderConfig,
    batch: &mut Vec<LogRecord>,
) {
    histogram!("monitoring_log_batch_size").record(batch.len() as f64);
    let body = batch_payload(&config.app_name, batch);
    let count = batch.len();
    batch.clear();

    let result = http
        .post(&config.endpoint)
        .header("X-License-Key", &config.license_key)
        .json(&body)
        .send()
        .and_then(|response| response.error_for_status());

    match result {
        Ok(_) => {
            counter!("monitoring_log_batches_total", "result" => "ok").increment(1);
        }
        Err(err) => {
            counter!("monitoring_log_batches_total", "result" => "error").increment(1);
            config
                .diagnostics
                .emit(format_args!("failed to forward {count} records: {err}"));
        }
    }
}

/// Request body in the log API's "detailed" shape: shared attributes once,
/// then the records.
pub(crate) fn batch_payload(app_name: &str, batch: &[LogRecord]) -> serde_json::Value {
    json!([{
        "common": {
            "attributes": {
                "service.name": app_name,
                "entity.name": app_name,
            }
        },
        "logs": batch,
    }])
}
