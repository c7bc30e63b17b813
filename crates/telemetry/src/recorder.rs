//! Thread-safe span collector for a single run.

use crate::TelemetryError;
use crate::model::{RunTrace, StageSpan};
use gapfill_core::stage::Stage;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Collects the spans of one run.
///
/// Thread-safe via `RwLock`; a poisoned lock is recovered rather than
/// propagated since spans are append-only bookkeeping.
pub struct TraceRecorder {
    trace: RwLock<RunTrace>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            trace: RwLock::new(RunTrace::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RunTrace> {
        self.trace.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunTrace> {
        self.trace.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a root span and return its id.
    pub fn start(&self, stage: Stage, label: impl Into<String>) -> String {
        let span = StageSpan::new(stage, label);
        let id = span.id.clone();
        debug!(stage = %stage, label = %span.label, "Stage started");
        self.write().add_span(span);
        id
    }

    /// Open a span nested under `parent_id`.
    pub fn start_child(&self, parent_id: &str, stage: Stage, label: impl Into<String>) -> String {
        let span = StageSpan::new(stage, label).with_parent(parent_id);
        let id = span.id.clone();
        self.write().add_span(span);
        id
    }

    /// Close a span successfully, optionally recording its output row count.
    pub fn finish(&self, span_id: &str, rows: Option<usize>) -> Result<(), TelemetryError> {
        self.close(span_id, true, rows, None)
    }

    /// Close a span as failed with the error message.
    pub fn fail(&self, span_id: &str, error: &str) -> Result<(), TelemetryError> {
        self.close(span_id, false, None, Some(error.to_string()))
    }

    fn close(
        &self,
        span_id: &str,
        success: bool,
        rows: Option<usize>,
        error: Option<String>,
    ) -> Result<(), TelemetryError> {
        let mut trace = self.write();
        let span = trace
            .spans
            .iter_mut()
            .find(|s| s.id == span_id)
            .ok_or_else(|| TelemetryError::UnknownSpan(span_id.to_string()))?;
        if !span.is_open() {
            return Err(TelemetryError::SpanClosed(span_id.to_string()));
        }
        span.end(success);
        span.rows = rows;
        span.error = error;
        debug!(
            stage = %span.stage,
            label = %span.label,
            success,
            duration_ms = span.duration_ms.unwrap_or(0),
            "Stage finished"
        );
        Ok(())
    }

    /// Attach a metadata entry to a span.
    pub fn annotate(
        &self,
        span_id: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), TelemetryError> {
        let mut trace = self.write();
        let span = trace
            .spans
            .iter_mut()
            .find(|s| s.id == span_id)
            .ok_or_else(|| TelemetryError::UnknownSpan(span_id.to_string()))?;
        span.metadata.insert(key.into(), value);
        Ok(())
    }

    /// Mark the run as complete.
    pub fn end(&self) {
        self.write().end();
    }

    /// A copy of the trace so far.
    pub fn snapshot(&self) -> RunTrace {
        self.read().clone()
    }

    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string_pretty(&*self.read())?)
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}
