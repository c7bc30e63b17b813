//! Forecaster trait: the abstraction over probabilistic forecasting backends.
//!
//! A Forecaster receives a context series plus the timestamps to predict and
//! returns, for each timestamp, a set of quantile values. The model behind it
//! (e.g. a pretrained Chronos checkpoint) is opaque to the pipeline.
//!
//! Implementations: HTTP forecasting service, saved-table replay, scripted
//! test doubles.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::frame::{ColumnBindings, ContextFrame, FutureFrame};
use crate::series::{Target, Year};

/// A probability level identifying one column of a quantile forecast.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantileLevel(f64);

impl QuantileLevel {
    /// A level strictly inside `(0, 1)`.
    pub fn new(p: f64) -> Option<Self> {
        (p.is_finite() && p > 0.0 && p < 1.0).then_some(Self(p))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Canonical textual form: the shortest decimal that round-trips (`"0.5"`).
    pub fn label(&self) -> String {
        self.0.to_string()
    }

    /// Parse a column key such as `"0.1"`; anything else is not a level.
    pub fn parse_label(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::new)
    }
}

impl std::fmt::Display for QuantileLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The deciles `0.1 … 0.9`.
pub fn default_quantile_levels() -> Vec<QuantileLevel> {
    [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9]
        .into_iter()
        .filter_map(QuantileLevel::new)
        .collect()
}

/// One quantile column of one forecast row. `None` is a null cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileCell {
    pub level: QuantileLevel,
    pub value: Option<f64>,
}

/// One predicted timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub timestamp: NaiveDateTime,
    /// Year resolved from `timestamp`.
    pub year: Year,
    pub series_id: String,
    pub target_name: String,
    /// Point forecast column, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<f64>,
    pub quantiles: Vec<QuantileCell>,
}

impl ForecastRow {
    pub fn new(
        timestamp: NaiveDateTime,
        series_id: impl Into<String>,
        target_name: impl Into<String>,
        predictions: Option<f64>,
        quantiles: Vec<QuantileCell>,
    ) -> Self {
        Self {
            timestamp,
            year: timestamp.year(),
            series_id: series_id.into(),
            target_name: target_name.into(),
            predictions,
            quantiles,
        }
    }

    /// The cell whose canonical label equals `label` exactly.
    pub fn quantile(&self, label: &str) -> Option<&QuantileCell> {
        self.quantiles.iter().find(|c| c.level.label() == label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.quantiles.iter().map(|c| c.level.label()).collect()
    }
}

/// The forecaster's answer for one target: one row per future timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileForecast {
    pub target: Target,
    pub rows: Vec<ForecastRow>,
}

impl QuantileForecast {
    pub fn new(target: Target, rows: Vec<ForecastRow>) -> Self {
        Self { target, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check the adapter contract: exactly one row per requested timestamp,
    /// in future-frame order, for the requested series.
    pub fn verify_contract(&self, future: &FutureFrame) -> Result<(), ForecastError> {
        if self.rows.len() != future.len() {
            return Err(ForecastError::RowCountMismatch {
                expected: future.len(),
                actual: self.rows.len(),
            });
        }
        for (row, wanted) in self.rows.iter().zip(&future.rows) {
            if row.timestamp != wanted.timestamp || row.series_id != wanted.series_id {
                return Err(ForecastError::UnexpectedRow {
                    year: row.year,
                    series_id: row.series_id.clone(),
                    expected_year: wanted.timestamp.year(),
                });
            }
        }
        Ok(())
    }
}

/// Everything a forecaster needs for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub context: ContextFrame,
    pub future: FutureFrame,
    /// Always the number of future rows.
    pub prediction_length: usize,
    pub quantile_levels: Vec<QuantileLevel>,
    pub bindings: ColumnBindings,
}

impl ForecastRequest {
    pub fn new(
        context: ContextFrame,
        future: FutureFrame,
        quantile_levels: Vec<QuantileLevel>,
        bindings: ColumnBindings,
    ) -> Self {
        let prediction_length = future.len();
        Self {
            context,
            future,
            prediction_length,
            quantile_levels,
            bindings,
        }
    }

    pub fn target(&self) -> Target {
        self.bindings.target
    }
}

/// The core Forecaster trait.
///
/// The pipeline calls `forecast()` once per target without knowing which
/// backend answers. Calls are expected to be slow (model inference) but
/// deterministic for fixed weights.
#[async_trait]
pub trait Forecaster: Send + Sync {
    /// A human-readable name for this backend (e.g., "http", "replay").
    fn name(&self) -> &str;

    /// Predict every timestamp of the request's future frame.
    async fn forecast(
        &self,
        request: ForecastRequest,
    ) -> std::result::Result<QuantileForecast, ForecastError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ForecastError> {
        Ok(true)
    }
}
