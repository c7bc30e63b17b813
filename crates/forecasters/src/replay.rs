//! Replay forecaster: serves saved forecast tables instead of running a model.
//!
//! Forecaster calls are slow and the model may not be reachable where the
//! reconciliation is re-run. Saving each target's forecast once
//! (`<dir>/<Target>.csv`) and replaying it keeps the selection and merge
//! steps reproducible with the forecaster output held fixed.

use async_trait::async_trait;
use gapfill_core::error::ForecastError;
use gapfill_core::forecast::{ForecastRequest, ForecastRow, Forecaster, QuantileForecast};
use gapfill_core::frame::ColumnBindings;
use gapfill_core::series::Target;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::wire;

/// A forecaster that answers from saved CSV tables.
pub struct ReplayForecaster {
    dir: PathBuf,
}

impl ReplayForecaster {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the saved table for a target lives.
    pub fn table_path(dir: &Path, target: Target) -> PathBuf {
        dir.join(format!("{}.csv", target.column()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Parse a saved forecast table.
pub fn read_forecast_csv(
    content: &str,
    bindings: &ColumnBindings,
) -> Result<Vec<ForecastRow>, ForecastError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::Replay(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| ForecastError::Replay(format!("line {}: {e}", idx + 2)))?;
        let obj: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(wire::parse_row(&obj, bindings)?);
    }
    Ok(rows)
}

/// Serialize forecast rows as a CSV table readable by [`read_forecast_csv`].
pub fn write_forecast_csv(
    rows: &[ForecastRow],
    bindings: &ColumnBindings,
) -> Result<Vec<u8>, ForecastError> {
    let levels = wire::union_labels(rows);
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let mut header = vec![
        bindings.timestamp_column.clone(),
        bindings.id_column.clone(),
        wire::TARGET_NAME_COLUMN.to_string(),
        wire::PREDICTIONS_COLUMN.to_string(),
    ];
    header.extend(levels.iter().map(|l| l.label()));
    writer
        .write_record(&header)
        .map_err(|e| ForecastError::Replay(e.to_string()))?;

    let cell = |v: Option<f64>| v.map(|f| f.to_string()).unwrap_or_default();

    for row in rows {
        let mut record = vec![
            wire::format_timestamp(&row.timestamp),
            row.series_id.clone(),
            row.target_name.clone(),
            cell(row.predictions),
        ];
        record.extend(levels.iter().map(|level| {
            cell(
                row.quantiles
                    .iter()
                    .find(|c| c.level == *level)
                    .and_then(|c| c.value),
            )
        }));
        writer
            .write_record(&record)
            .map_err(|e| ForecastError::Replay(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ForecastError::Replay(e.to_string()))
}

#[async_trait]
impl Forecaster for ReplayForecaster {
    fn name(&self) -> &str {
        "replay"
    }

    async fn forecast(
        &self,
        request: ForecastRequest,
    ) -> std::result::Result<QuantileForecast, ForecastError> {
        let path = Self::table_path(&self.dir, request.target());
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ForecastError::Replay(format!("Failed to read {}: {e}", path.display()))
        })?;

        let saved = read_forecast_csv(&content, &request.bindings)?;
        debug!(path = %path.display(), rows = saved.len(), "Loaded saved forecast");

        let mut by_key: HashMap<(chrono::NaiveDateTime, &str), &ForecastRow> = HashMap::new();
        for row in &saved {
            by_key.entry((row.timestamp, row.series_id.as_str())).or_insert(row);
        }

        // Answer in future-frame order; gaps surface as a row-count mismatch.
        let mut rows = Vec::with_capacity(request.future.len());
        for future in &request.future.rows {
            match by_key.get(&(future.timestamp, future.series_id.as_str())) {
                Some(row) => rows.push((*row).clone()),
                None => warn!(
                    timestamp = %future.timestamp,
                    series_id = %future.series_id,
                    "Saved forecast has no row for requested timestamp"
                ),
            }
        }

        Ok(QuantileForecast::new(request.target(), rows))
    }

    async fn health_check(&self) -> std::result::Result<bool, ForecastError> {
        Ok(Target::ALL
            .iter()
            .all(|t| Self::table_path(&self.dir, *t).is_file()))
    }
}
