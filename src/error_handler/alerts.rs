//! Fire-and-forget alert fan-out for errors that trigger alerting (§4.4
//! step 7: severity `Critical`/`Emergency`).
//!
//! Re-expressed from the teacher's sink hierarchy using `async_trait`
//! directly rather than `tower::Service`: a sink is something you hand a
//! record to and don't wait on beyond logging its own failure.

use crate::taxonomy::ErrorRecord;
use async_trait::async_trait;
use std::sync::Mutex;
#[cfg(feature = "telemetry-json")]
use std::io::Write;

#[async_trait]
pub trait AlertSink: Send + Sync + std::fmt::Debug {
    async fn send(&self, record: &ErrorRecord) -> Result<(), String>;
}

/// Discards every alert. Useful as a default when alerting isn't wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AlertSink for NullSink {
    async fn send(&self, _record: &ErrorRecord) -> Result<(), String> {
        Ok(())
    }
}

/// Emits a structured `tracing` event at `error!` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, record: &ErrorRecord) -> Result<(), String> {
        tracing::error!(
            adapter = %record.context.adapter,
            operation = %record.context.operation,
            category = %record.category,
            severity = %record.severity,
            correlation_id = %record.context.correlation_id,
            "{}",
            record.message
        );
        Ok(())
    }
}

/// Retains alerts in memory; used by tests and by callers composing a
/// `MulticastSink` that wants an inspectable tap.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ErrorRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn send(&self, record: &ErrorRecord) -> Result<(), String> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(record.clone());
        Ok(())
    }
}

/// Fans a single alert out to every wrapped sink, collecting failures
/// rather than stopping at the first one.
#[derive(Debug)]
pub struct MulticastSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl MulticastSink {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AlertSink for MulticastSink {
    async fn send(&self, record: &ErrorRecord) -> Result<(), String> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.send(record).await {
                failures.push(e);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}

/// Tries a primary sink, falling back to a secondary if the primary fails.
#[derive(Debug)]
pub struct FallbackSink {
    primary: Box<dyn AlertSink>,
    secondary: Box<dyn AlertSink>,
}

impl FallbackSink {
    pub fn new(primary: Box<dyn AlertSink>, secondary: Box<dyn AlertSink>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl AlertSink for FallbackSink {
    async fn send(&self, record: &ErrorRecord) -> Result<(), String> {
        if self.primary.send(record).await.is_ok() {
            return Ok(());
        }
        self.secondary.send(record).await
    }
}

/// Serializes each alert to a line of JSON and hands it to a caller-supplied
/// writer, for shipping to a log aggregator instead of (or alongside)
/// `tracing`.
#[cfg(feature = "telemetry-json")]
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

#[cfg(feature = "telemetry-json")]
impl<W> std::fmt::Debug for JsonSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSink").finish_non_exhaustive()
    }
}

#[cfg(feature = "telemetry-json")]
impl<W: std::io::Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

#[cfg(feature = "telemetry-json")]
#[async_trait]
impl<W: std::io::Write + Send> AlertSink for JsonSink<W> {
    async fn send(&self, record: &ErrorRecord) -> Result<(), String> {
        let line = serde_json::to_string(record).map_err(|e| e.to_string())?;
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line).map_err(|e| e.to_string())
    }
}

/// Emits `record` to `sink`, logging (but not propagating) any failure.
/// This is the boundary the error handler calls through so a broken alert
/// pipe never blocks the crawl loop.
pub async fn emit_best_effort(sink: &dyn AlertSink, record: &ErrorRecord) {
    if let Err(e) = sink.send(record).await {
        tracing::warn!(error = %e, correlation_id = %record.context.correlation_id, "alert sink failed");
    }
}
