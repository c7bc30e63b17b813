//! Reconciliation: join forecasts to choices, cast to counts, and fold the
//! imputed years back onto the original dataset.

use std::collections::{BTreeSet, HashMap};

use gapfill_core::choice::QuantileChoice;
use gapfill_core::error::MergeError;
use gapfill_core::forecast::QuantileForecast;
use gapfill_core::series::{ColumnType, Dataset, Number, Row, Target, Year};
use serde::{Deserialize, Serialize};

use crate::select::SelectedSeries;

/// Inner join on year: forecast rows whose year has an entry in `choice`,
/// defined or not, in forecast order.
pub fn join_choices(forecast: &QuantileForecast, choice: &QuantileChoice) -> QuantileForecast {
    QuantileForecast::new(
        forecast.target,
        forecast
            .rows
            .iter()
            .filter(|row| choice.has_entry(row.year))
            .cloned()
            .collect(),
    )
}

/// One target's imputed integer counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedColumn {
    pub target: Target,
    pub values: Vec<(Year, Option<i64>)>,
}

impl ImputedColumn {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Truncate toward zero. `None` and NaN stay absent.
fn to_count(target: Target, year: Year, value: Option<f64>) -> Result<Option<i64>, MergeError> {
    let Some(v) = value.filter(|v| !v.is_nan()) else {
        return Ok(None);
    };
    let t = v.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(MergeError::Cast {
            target,
            year,
            value: v,
        });
    }
    Ok(Some(t as i64))
}

/// Cast selected estimates to the integer count type.
pub fn cast_counts(selected: &SelectedSeries) -> Result<ImputedColumn, MergeError> {
    let values = selected
        .points
        .iter()
        .map(|p| Ok((p.year, to_count(selected.target, p.year, p.value)?)))
        .collect::<Result<Vec<_>, MergeError>>()?;
    Ok(ImputedColumn {
        target: selected.target,
        values,
    })
}

/// Inner join of the two targets on year, in Hare order.
pub fn combine_targets(hare: &ImputedColumn, lynx: &ImputedColumn) -> Vec<Row> {
    let mut by_year: HashMap<Year, Vec<Option<i64>>> = HashMap::new();
    for &(year, value) in &lynx.values {
        by_year.entry(year).or_default().push(value);
    }

    let count = |v: Option<i64>| v.map(Number::Int);
    hare.values
        .iter()
        .flat_map(|&(year, h)| {
            by_year
                .get(&year)
                .into_iter()
                .flatten()
                .map(move |&l| Row::new(year, count(h), count(l)))
        })
        .collect()
}

/// Years imputed for only one target, which [`combine_targets`] drops. Sorted.
pub fn unmatched_years(hare: &ImputedColumn, lynx: &ImputedColumn) -> Vec<Year> {
    let years = |c: &ImputedColumn| c.values.iter().map(|&(y, _)| y).collect::<BTreeSet<Year>>();
    years(hare)
        .symmetric_difference(&years(lynx))
        .copied()
        .collect()
}

/// The output table: original rows followed by the imputed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTable {
    pub table: Dataset,
    /// How many leading rows came from the original dataset.
    pub original_rows: usize,
}

impl ReconciledTable {
    pub fn imputed_rows(&self) -> usize {
        self.table.len() - self.original_rows
    }

    pub fn originals(&self) -> &[Row] {
        &self.table.rows()[..self.original_rows]
    }

    pub fn imputed(&self) -> &[Row] {
        &self.table.rows()[self.original_rows..]
    }
}

/// Vertical concatenation with column types relaxed to their supertype.
///
/// Imputed columns are integer counts, so an `Int` original column stays
/// `Int` and a `Float` one widens the imputed cells. No sorting, no
/// de-duplication: a year present in both parts appears twice.
pub fn concat_relaxed(original: &Dataset, imputed: Vec<Row>) -> ReconciledTable {
    let relaxed = |target: Target| {
        imputed
            .iter()
            .filter_map(|r| r.get(target))
            .map(|n| n.column_type())
            .fold(original.column_type(target), ColumnType::supertype)
    };
    let hare_type = relaxed(Target::Hare);
    let lynx_type = relaxed(Target::Lynx);

    let original_rows = original.len();
    let mut rows = Vec::with_capacity(original_rows + imputed.len());
    rows.extend_from_slice(original.rows());
    rows.extend(imputed);

    ReconciledTable {
        table: Dataset::with_types(rows, hare_type, lynx_type),
        original_rows,
    }
}
