//! Data model for run traces and stage spans.

use chrono::{DateTime, Utc};
use gapfill_core::stage::Stage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// One traced stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpan {
    /// Unique identifier.
    pub id: String,
    /// Parent span id (None for root spans).
    pub parent_id: Option<String>,
    pub stage: Stage,
    /// Human-readable label (target name, file name).
    pub label: String,
    pub started_at: DateTime<Utc>,
    /// When the span ended (None if still running).
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Rows produced by the stage, when it produces a table.
    pub rows: Option<usize>,
    /// Whether the stage succeeded.
    pub success: Option<bool>,
    /// Failure message, if the stage failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Arbitrary metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StageSpan {
    pub fn new(stage: Stage, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            stage,
            label: label.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            rows: None,
            success: None,
            error: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the parent span.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Mark the span as ended with the given success status.
    pub fn end(&mut self, success: bool) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.success = Some(success);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans of one `gapfill run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub id: String,
    pub spans: Vec<StageSpan>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunTrace {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_span(&mut self, span: StageSpan) {
        self.spans.push(span);
    }

    /// Mark the trace as complete.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// The innermost span that ended unsuccessfully: a failed span none of
    /// whose children also failed.
    pub fn failed_span(&self) -> Option<&StageSpan> {
        self.spans.iter().find(|s| {
            s.success == Some(false)
                && !self.spans.iter().any(|c| {
                    c.success == Some(false) && c.parent_id.as_deref() == Some(s.id.as_str())
                })
        })
    }

    /// Total duration of root spans in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.spans
            .iter()
            .filter(|s| s.parent_id.is_none())
            .filter_map(|s| s.duration_ms)
            .sum()
    }

    /// `(label, rows)` of every finished span of a stage, in record order.
    pub fn rows_by_stage(&self, stage: Stage) -> Vec<(String, usize)> {
        self.spans
            .iter()
            .filter(|s| s.stage == stage)
            .filter_map(|s| s.rows.map(|r| (s.label.clone(), r)))
            .collect()
    }
}

impl Default for RunTrace {
    fn default() -> Self {
        Self::new()
    }
}
