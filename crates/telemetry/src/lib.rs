//! Run tracing for gapfill.
//!
//! Records one span per pipeline stage with timings, row counts, and the
//! failure message of the stage that aborted the run. The stages of a target
//! pass nest under that pass's root span. The trace can be
//! exported as JSON next to the output artifact.

pub mod model;
pub mod recorder;

pub use model::{RunTrace, StageSpan};
pub use recorder::TraceRecorder;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown span id: {0}")]
    UnknownSpan(String),

    #[error("span already closed: {0}")]
    SpanClosed(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
