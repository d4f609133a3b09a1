//! Monitoring sink: fire-and-forget duration and exception reporting.
//!
//! Sinks must never affect control flow or results; implementations swallow
//! their own failures.

use crate::error::ShardgraphError;

pub trait MonitorSink: Send + Sync {
    /// Report an operation's wall-clock duration.
    fn record_duration(&self, op: &str, ms: u128);

    /// Report a failure with its operation context.
    fn record_exception(&self, err: &ShardgraphError, context: &str);
}

/// Default sink: structured log lines.
pub struct LogSink;

impl MonitorSink for LogSink {
    fn record_duration(&self, op: &str, ms: u128) {
        log::debug!("op={} duration_ms={}", op, ms);
    }

    fn record_exception(&self, err: &ShardgraphError, context: &str) {
        log::warn!("op={} error_kind={} error={}", context, err.kind(), err);
    }
}

/// Discards everything; used in tests.
pub struct NullSink;

impl MonitorSink for NullSink {
    fn record_duration(&self, _op: &str, _ms: u128) {}

    fn record_exception(&self, _err: &ShardgraphError, _context: &str) {}
}
