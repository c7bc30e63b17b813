//! Quantile selection: collapse each forecast row to one point estimate.

use gapfill_core::choice::QuantileChoice;
use gapfill_core::error::SelectionError;
use gapfill_core::forecast::{ForecastRow, QuantileForecast, QuantileLevel};
use gapfill_core::series::{Target, Year};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectedPoint {
    pub year: Year,
    pub value: Option<f64>,
}

/// The `(year, value)` projection of a forecast after selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSeries {
    pub target: Target,
    pub points: Vec<SelectedPoint>,
}

impl SelectedSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points carrying a value.
    pub fn defined(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }
}

/// Pick, for every forecast row, the quantile column named by the year's
/// chosen label.
///
/// Rows whose year has no usable label (no entry, or the missing marker)
/// are kept with a `None` value. A label matching no column of the row is
/// fatal; there is no fallback to a neighbouring level or the median.
///
/// Output has exactly one point per input row, in input order.
pub fn select_quantiles(
    forecast: &QuantileForecast,
    choice: &QuantileChoice,
) -> Result<SelectedSeries, SelectionError> {
    let points = forecast
        .rows
        .iter()
        .map(|row| {
            let Some(label) = choice.label(row.year) else {
                return Ok(SelectedPoint {
                    year: row.year,
                    value: None,
                });
            };
            let cell = row
                .quantile(label)
                .ok_or_else(|| SelectionError::UnresolvedQuantile {
                    year: row.year,
                    label: label.to_string(),
                    available: row.labels().join(", "),
                    hint: canonical_hint(row, label),
                })?;
            Ok(SelectedPoint {
                year: row.year,
                value: cell.value,
            })
        })
        .collect::<Result<Vec<_>, SelectionError>>()?;

    Ok(SelectedSeries {
        target: forecast.target,
        points,
    })
}

/// Point at the canonical label when `label` spells an available level
/// differently (`"0.50"` for `"0.5"`).
fn canonical_hint(row: &ForecastRow, label: &str) -> String {
    QuantileLevel::parse_label(label)
        .map(|level| level.label())
        .filter(|canonical| canonical != label && row.quantile(canonical).is_some())
        .map(|canonical| format!("; labels match exactly, write '{canonical}'"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_core::forecast::QuantileCell;
    use gapfill_core::frame::year_end;

    fn row(year: Year, levels: &[f64], base: f64) -> ForecastRow {
        ForecastRow::new(
            year_end(year).unwrap(),
            "series-A",
            "Hare",
            Some(base),
            levels
                .iter()
                .map(|&p| QuantileCell {
                    level: QuantileLevel::new(p).unwrap(),
                    value: Some(base + p * 10.0),
                })
                .collect(),
        )
    }

    const ALL_LEVELS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

    #[test]
    fn picks_chosen_column_per_year() {
        let fc = QuantileForecast::new(
            Target::Hare,
            vec![row(1936, &ALL_LEVELS, 30.0), row(1937, &ALL_LEVELS, 40.0)],
        );
        let choice = QuantileChoice::from_raw("c", [(1936, "0.1"), (1937, "0.9")]).unwrap();
        let sel = select_quantiles(&fc, &choice).unwrap();
        assert_eq!(sel.points[0], SelectedPoint { year: 1936, value: Some(31.0) });
        assert_eq!(sel.points[1], SelectedPoint { year: 1937, value: Some(49.0) });
    }

    #[test]
    fn missing_marker_and_absent_entry_yield_none() {
        let fc = QuantileForecast::new(
            Target::Hare,
            vec![
                row(1936, &ALL_LEVELS, 30.0),
                row(1937, &ALL_LEVELS, 40.0),
                row(1938, &ALL_LEVELS, 50.0),
            ],
        );
        let choice = QuantileChoice::from_raw("c", [(1936, "nan"), (1937, "0.5")]).unwrap();
        let sel = select_quantiles(&fc, &choice).unwrap();
        assert_eq!(sel.len(), 3);
        assert_eq!(sel.points[0].value, None);
        assert_eq!(sel.points[1].value, Some(45.0));
        assert_eq!(sel.points[2].value, None);
        assert_eq!(sel.defined(), 1);
    }

    #[test]
    fn unresolved_label_is_fatal() {
        let levels = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.8, 0.9];
        let fc = QuantileForecast::new(Target::Lynx, vec![row(1937, &levels, 10.0)]);
        let choice = QuantileChoice::from_raw("c", [(1937, "0.7")]).unwrap();
        let err = select_quantiles(&fc, &choice).unwrap_err();
        let SelectionError::UnresolvedQuantile {
            year,
            label,
            available,
            hint,
        } = err;
        assert_eq!(year, 1937);
        assert_eq!(label, "0.7");
        assert!(available.contains("0.6") && available.contains("0.8"));
        assert!(hint.is_empty());
    }

    #[test]
    fn label_match_is_exact() {
        let fc = QuantileForecast::new(Target::Hare, vec![row(1936, &ALL_LEVELS, 0.0)]);
        let choice = QuantileChoice::from_raw("c", [(1936, "0.50")]).unwrap();
        let err = select_quantiles(&fc, &choice).unwrap_err();
        let SelectionError::UnresolvedQuantile { label, hint, .. } = &err;
        assert_eq!(label, "0.50");
        assert!(hint.contains("'0.5'"));
        assert!(err.to_string().ends_with("write '0.5'"));
    }

    #[test]
    fn null_cell_in_chosen_column_stays_null() {
        let mut r = row(1936, &[0.5], 30.0);
        r.quantiles[0].value = None;
        let fc = QuantileForecast::new(Target::Hare, vec![r]);
        let choice = QuantileChoice::from_raw("c", [(1936, "0.5")]).unwrap();
        assert_eq!(select_quantiles(&fc, &choice).unwrap().points[0].value, None);
    }

    #[test]
    fn row_count_and_order_preserved() {
        let years = [1940, 1936, 1938];
        let fc = QuantileForecast::new(
            Target::Hare,
            years.iter().map(|&y| row(y, &ALL_LEVELS, 1.0)).collect(),
        );
        let choice = QuantileChoice::from_raw("c", [(1936, "0.2")]).unwrap();
        let sel = select_quantiles(&fc, &choice).unwrap();
        let out: Vec<Year> = sel.points.iter().map(|p| p.year).collect();
        assert_eq!(out, years);
    }
}
