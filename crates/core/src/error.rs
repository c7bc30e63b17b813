//! Error types for the gapfill domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each pipeline component has its own error enum; the top-level [`Error`]
//! wraps them and can tag a failure with the target pass and stage it came
//! from.

use std::path::PathBuf;

use thiserror::Error;

use crate::series::{Target, Year};
use crate::stage::Stage;

/// The top-level error type for all gapfill operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input tables ---
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    // --- Frame construction ---
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    // --- Forecast adapter ---
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    // --- Quantile selection ---
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    // --- Reconciliation ---
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// A failure inside one target pass, tagged with where it happened.
    #[error("{target} pass failed at stage '{stage}': {source}")]
    Pass {
        target: Target,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Filesystem ---
    #[error("I/O error on {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Tag this error with the target pass and stage that produced it.
    ///
    /// Already-tagged errors are returned unchanged so the innermost stage wins.
    pub fn in_pass(self, target: Target, stage: Stage) -> Self {
        match self {
            Error::Pass { .. } => self,
            other => Error::Pass {
                target,
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage a tagged error failed in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Pass { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Component errors ---

/// Problems with a tabular input (original dataset, choice table, saved forecast).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Invalid value '{value}' in column '{column}' of {table} (line {line})")]
    InvalidValue {
        table: String,
        column: String,
        line: usize,
        value: String,
    },

    #[error("Duplicate year {year} in {table}")]
    DuplicateYear { table: String, year: Year },

    #[error("Failed to read {table}: {reason}")]
    Read { table: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("Invalid imputation range: start {start} is after end {end}")]
    InvalidRange { start: Year, end: Year },

    #[error("Year {0} has no representable year-end date")]
    YearOutOfRange(Year),
}

/// Errors raised by, or while verifying, the external forecaster.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("Forecast request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by forecaster, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Forecaster not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Forecaster output is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("Forecaster output has invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },

    #[error("Forecaster returned {actual} rows, expected {expected}")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error(
        "Forecaster returned a row for {series_id} year {year} where year {expected_year} was requested"
    )]
    UnexpectedRow {
        year: Year,
        series_id: String,
        expected_year: Year,
    },

    #[error("Forecaster rejected empty context: {0}")]
    EmptyContext(String),

    #[error("Replay failed: {0}")]
    Replay(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error(
        "Chosen quantile '{label}' for year {year} matches no forecast column (available: {available}){hint}"
    )]
    UnresolvedQuantile {
        year: Year,
        label: String,
        available: String,
        /// Empty, or a pointer to the canonical spelling of `label`.
        hint: String,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("Cannot cast {value} to an integer count ({target}, year {year})")]
    Cast { target: Target, year: Year, value: f64 },
}
