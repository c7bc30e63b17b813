//! Row-level wire format shared by the HTTP and replay backends.
//!
//! A forecast row on the wire is a flat object of column → cell. The bound
//! timestamp and identifier columns, `target_name`, and the optional
//! `predictions` column have fixed meanings; every other key that parses as a
//! quantile level (`"0.1"`, `"0.5"`, …) is a quantile column. Cells may be
//! JSON numbers, numeric strings (CSV), or null/missing markers.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use gapfill_core::choice::is_missing_marker;
use gapfill_core::error::ForecastError;
use gapfill_core::forecast::{ForecastRow, QuantileCell, QuantileLevel};
use gapfill_core::frame::ColumnBindings;
use serde_json::{Map, Value};

pub const TARGET_NAME_COLUMN: &str = "target_name";
pub const PREDICTIONS_COLUMN: &str = "predictions";

/// Envelope key of the HTTP response body.
pub const FORECAST_KEY: &str = "forecast";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts RFC 3339, ISO datetimes with `T` or space, and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn require<'a>(obj: &'a Map<String, Value>, column: &str) -> Result<&'a Value, ForecastError> {
    obj.get(column).ok_or_else(|| ForecastError::MissingColumn {
        column: column.to_string(),
    })
}

fn invalid(column: &str, value: &Value) -> ForecastError {
    ForecastError::InvalidValue {
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A numeric cell: `Some(None)` is a null, `None` is unparseable.
fn number(value: &Value) -> Option<Option<f64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => n.as_f64().map(Some),
        Value::String(s) if is_missing_marker(s) => Some(None),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| (!f.is_nan()).then_some(f)),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp(s),
        // pandas `to_json` emits datetimes as epoch milliseconds.
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// Parse one wire row.
pub fn parse_row(
    obj: &Map<String, Value>,
    bindings: &ColumnBindings,
) -> Result<ForecastRow, ForecastError> {
    let ts_value = require(obj, &bindings.timestamp_column)?;
    let ts = timestamp(ts_value).ok_or_else(|| invalid(&bindings.timestamp_column, ts_value))?;
    let series_id = text(require(obj, &bindings.id_column)?);
    let target_name = text(require(obj, TARGET_NAME_COLUMN)?);

    let predictions = match obj.get(PREDICTIONS_COLUMN) {
        Some(v) => number(v).ok_or_else(|| invalid(PREDICTIONS_COLUMN, v))?,
        None => None,
    };

    let mut quantiles: Vec<QuantileCell> = Vec::new();
    for (key, value) in obj {
        if key == &bindings.timestamp_column || key == &bindings.id_column {
            continue;
        }
        let Some(level) = QuantileLevel::parse_label(key) else {
            continue;
        };
        if quantiles.iter().any(|c| c.level == level) {
            return Err(ForecastError::InvalidValue {
                column: key.clone(),
                value: format!("duplicate quantile level {level}"),
            });
        }
        let value = number(value).ok_or_else(|| invalid(key, value))?;
        quantiles.push(QuantileCell { level, value });
    }

    if quantiles.is_empty() {
        return Err(ForecastError::MissingColumn {
            column: "<quantile levels>".into(),
        });
    }
    quantiles.sort_by(|a, b| a.level.value().total_cmp(&b.level.value()));

    Ok(ForecastRow::new(ts, series_id, target_name, predictions, quantiles))
}

/// Parse a response body: either a bare array of rows or `{"forecast": [...]}`.
pub fn parse_rows(body: &Value, bindings: &ColumnBindings) -> Result<Vec<ForecastRow>, ForecastError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(obj) => match obj.get(FORECAST_KEY) {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(ForecastError::MissingColumn {
                    column: FORECAST_KEY.into(),
                });
            }
        },
        other => return Err(invalid(FORECAST_KEY, other)),
    };

    rows.iter()
        .map(|row| match row {
            Value::Object(obj) => parse_row(obj, bindings),
            other => Err(invalid(FORECAST_KEY, other)),
        })
        .collect()
}

/// Quantile labels present in any row, ordered by level.
pub fn union_labels(rows: &[ForecastRow]) -> Vec<QuantileLevel> {
    let mut levels: Vec<QuantileLevel> = Vec::new();
    for cell in rows.iter().flat_map(|r| r.quantiles.iter()) {
        if !levels.contains(&cell.level) {
            levels.push(cell.level);
        }
    }
    levels.sort_by(|a, b| a.value().total_cmp(&b.value()));
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use gapfill_core::series::Target;
    use serde_json::json;

    fn bindings() -> ColumnBindings {
        ColumnBindings::new(Target::Hare)
    }

    #[test]
    fn timestamp_formats() {
        for raw in [
            "1937-12-31T00:00:00",
            "1937-12-31 00:00:00",
            "1937-12-31",
            "1937-12-31T00:00:00Z",
            "1937-12-31T00:00:00.000",
        ] {
            let ts = parse_timestamp(raw).unwrap_or_else(|| panic!("failed on {raw}"));
            assert_eq!(ts.year(), 1937);
        }
        assert!(parse_timestamp("last winter").is_none());
    }

    #[test]
    fn parses_json_row() {
        let obj = json!({
            "YearDT": "1937-12-31T00:00:00",
            "id": "series-A",
            "target_name": "Hare",
            "predictions": 41.5,
            "0.9": 60.0,
            "0.1": 20.0,
            "0.5": 42.0
        });
        let row = parse_row(obj.as_object().unwrap(), &bindings()).unwrap();
        assert_eq!(row.year, 1937);
        assert_eq!(row.labels(), vec!["0.1", "0.5", "0.9"]);
        assert_eq!(row.predictions, Some(41.5));
        assert_eq!(row.quantile("0.5").unwrap().value, Some(42.0));
    }

    #[test]
    fn parses_csv_style_strings_and_nulls() {
        let obj = json!({
            "YearDT": "1938-12-31 00:00:00",
            "id": "series-A",
            "target_name": "Hare",
            "predictions": "",
            "0.5": "nan",
            "0.6": "12.5"
        });
        let row = parse_row(obj.as_object().unwrap(), &bindings()).unwrap();
        assert_eq!(row.predictions, None);
        assert_eq!(row.quantile("0.5").unwrap().value, None);
        assert_eq!(row.quantile("0.6").unwrap().value, Some(12.5));
    }

    #[test]
    fn epoch_millis_timestamp() {
        // 1970-12-31T00:00:00Z
        let obj = json!({
            "YearDT": 31_449_600_000_i64,
            "id": "series-A",
            "target_name": "Lynx",
            "0.5": 3.0
        });
        let row = parse_row(obj.as_object().unwrap(), &bindings()).unwrap();
        assert_eq!(row.year, 1970);
    }

    #[test]
    fn missing_timestamp_column() {
        let obj = json!({"id": "series-A", "target_name": "Hare", "0.5": 1.0});
        assert_eq!(
            parse_row(obj.as_object().unwrap(), &bindings()),
            Err(ForecastError::MissingColumn {
                column: "YearDT".into()
            })
        );
    }

    #[test]
    fn row_without_quantiles_rejected() {
        let obj = json!({"YearDT": "1937-12-31", "id": "series-A", "target_name": "Hare"});
        assert!(matches!(
            parse_row(obj.as_object().unwrap(), &bindings()),
            Err(ForecastError::MissingColumn { .. })
        ));
    }

    #[test]
    fn duplicate_level_spellings_rejected() {
        let obj = json!({
            "YearDT": "1937-12-31", "id": "series-A", "target_name": "Hare",
            "0.5": 1.0, "0.50": 2.0
        });
        assert!(matches!(
            parse_row(obj.as_object().unwrap(), &bindings()),
            Err(ForecastError::InvalidValue { .. })
        ));
    }

    #[test]
    fn envelope_or_bare_array() {
        let row = json!({"YearDT": "1937-12-31", "id": "a", "target_name": "Hare", "0.5": 1.0});
        let bare = json!([row.clone()]);
        let wrapped = json!({ "forecast": [row] });
        assert_eq!(parse_rows(&bare, &bindings()).unwrap().len(), 1);
        assert_eq!(parse_rows(&wrapped, &bindings()).unwrap().len(), 1);
        assert!(parse_rows(&json!({"rows": []}), &bindings()).is_err());
    }

    #[test]
    fn union_labels_sorted() {
        let a = json!({"YearDT": "1937-12-31", "id": "a", "target_name": "Hare", "0.9": 1.0});
        let b = json!({"YearDT": "1938-12-31", "id": "a", "target_name": "Hare", "0.1": 1.0, "0.9": 2.0});
        let rows = parse_rows(&json!([a, b]), &bindings()).unwrap();
        let labels: Vec<String> = union_labels(&rows).iter().map(|l| l.label()).collect();
        assert_eq!(labels, vec!["0.1", "0.9"]);
    }
}
