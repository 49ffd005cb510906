//! Graphite plaintext sink and key sanitizing.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PublishError;

/// Make an identifier safe as one graphite path segment.
pub fn sanitize_key(key: &str) -> String {
    key.replace(['.', ' '], "_")
}

/// Render `data` as graphite plaintext protocol lines under `context`.
pub fn format_lines(context: &str, data: &BTreeMap<String, f64>, timestamp: i64) -> String {
    let mut out = String::new();
    for (key, value) in data {
        let _ = writeln!(out, "{context}.{key} {value} {timestamp}");
    }
    out
}

/// Destination for `(identifier, value)` pairs published under a context.
pub trait MetricsSink {
    fn send(&mut self, context: &str, data: &BTreeMap<String, f64>) -> Result<(), PublishError>;
}

/// Sends metrics to a graphite carbon listener over TCP.
#[derive(Debug, Clone)]
pub struct GraphiteSink {
    host: String,
    port: u16,
    timeout: Duration,
}

impl GraphiteSink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl MetricsSink for GraphiteSink {
    fn send(&mut self, context: &str, data: &BTreeMap<String, f64>) -> Result<(), PublishError> {
        if data.is_empty() {
            debug!(context, "nothing to send to graphite");
            return Ok(());
        }
        let payload = format_lines(context, data, Utc::now().timestamp());
        let address = self.address();
        let io_err = |e: std::io::Error| PublishError::Io(format!("{address}: {e}"));

        let mut stream = TcpStream::connect(&address).map_err(io_err)?;
        stream.set_write_timeout(Some(self.timeout)).map_err(io_err)?;
        stream.write_all(payload.as_bytes()).map_err(io_err)?;
        stream.flush().map_err(io_err)?;
        info!(%address, context, metrics = data.len(), "sent metrics to graphite");
        Ok(())
    }
}

/// Keeps every batch in memory; used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub batches: Vec<(String, BTreeMap<String, f64>)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch rendered as plaintext lines at `timestamp`.
    pub fn render(&self, timestamp: i64) -> String {
        self.batches
            .iter()
            .map(|(context, data)| format_lines(context, data, timestamp))
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn send(&mut self, context: &str, data: &BTreeMap<String, f64>) -> Result<(), PublishError> {
        self.batches.push((context.to_string(), data.clone()));
        Ok(())
    }
}
