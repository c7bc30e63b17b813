//! Context and future frames in the shape the forecaster consumes.

use gapfill_core::error::FrameError;
use gapfill_core::frame::{ContextFrame, ContextRow, FutureFrame, FutureRow, YearRange, year_end};
use gapfill_core::series::{Dataset, Target};

/// One row per known value of `target`, in dataset order.
///
/// Absent and NaN cells are not known values and are skipped. An empty
/// result is returned as-is; whether that is acceptable is the forecaster's
/// call.
pub fn build_context(
    dataset: &Dataset,
    target: Target,
    series_id: &str,
) -> Result<ContextFrame, FrameError> {
    let rows = dataset
        .observations(target)
        .filter_map(|obs| {
            let value = obs.value?.as_f64();
            (!value.is_nan()).then_some((obs.year, value))
        })
        .map(|(year, value)| {
            Ok(ContextRow {
                timestamp: year_end(year)?,
                value,
                series_id: series_id.to_string(),
            })
        })
        .collect::<Result<Vec<_>, FrameError>>()?;

    Ok(ContextFrame { target, rows })
}

/// One row per year of the inclusive range, without values.
pub fn build_future(range: &YearRange, series_id: &str) -> Result<FutureFrame, FrameError> {
    let rows = range
        .years()
        .map(|year| {
            Ok(FutureRow {
                timestamp: year_end(year)?,
                series_id: series_id.to_string(),
            })
        })
        .collect::<Result<Vec<_>, FrameError>>()?;

    Ok(FutureFrame { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use gapfill_core::series::{Number, Row};

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Row::new(1900, Some(Number::Int(30)), Some(Number::Int(4))),
            Row::new(1901, None, Some(Number::Int(6))),
            Row::new(1902, Some(Number::Int(70)), None),
        ])
    }

    #[test]
    fn context_skips_absent_values() {
        let ctx = build_context(&dataset(), Target::Hare, "series-A").unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.rows[0].timestamp.year(), 1900);
        assert_eq!(ctx.rows[1].timestamp.year(), 1902);
        assert_eq!(ctx.rows[1].value, 70.0);
        assert!(ctx.rows.iter().all(|r| r.series_id == "series-A"));
    }

    #[test]
    fn context_timestamp_is_year_end_midnight() {
        let ctx = build_context(&dataset(), Target::Lynx, "s").unwrap();
        let ts = ctx.rows[0].timestamp;
        assert_eq!((ts.month(), ts.day()), (12, 31));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (0, 0, 0));
    }

    #[test]
    fn nan_is_not_a_known_value() {
        let ds = Dataset::new(vec![
            Row::new(1900, Some(Number::Float(f64::NAN)), None),
            Row::new(1901, Some(Number::Float(2.5)), None),
        ]);
        let ctx = build_context(&ds, Target::Hare, "s").unwrap();
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn empty_context_passes_through() {
        let ds = Dataset::new(vec![Row::new(1900, None, None)]);
        let ctx = build_context(&ds, Target::Hare, "s").unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn future_covers_inclusive_range() {
        let range = YearRange::new(1936, 1940).unwrap();
        let future = build_future(&range, "series-A").unwrap();
        let years: Vec<i32> = future.rows.iter().map(|r| r.timestamp.year()).collect();
        assert_eq!(years, vec![1936, 1937, 1938, 1939, 1940]);
    }

    #[test]
    fn single_year_future() {
        let range = YearRange::new(2025, 2025).unwrap();
        assert_eq!(build_future(&range, "s").unwrap().len(), 1);
    }
}
