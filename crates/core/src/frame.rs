//! Context and future frames in the shape the forecaster consumes.
//!
//! The forecaster works on timestamped, identified series rather than bare
//! years, so every year is re-expressed as its year-end instant
//! (31 December, 00:00:00) and every row carries a series identifier.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;
use crate::series::{Target, Year};

/// Series identifier used when none is configured.
pub const DEFAULT_SERIES_ID: &str = "series-A";

/// Default name of the identifier column in forecaster payloads.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Default name of the timestamp column in forecaster payloads.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "YearDT";

/// The year-end timestamp of a year.
pub fn year_end(year: Year) -> Result<NaiveDateTime, FrameError> {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(FrameError::YearOutOfRange(year))
}

/// An inclusive, non-empty range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "YearBounds")]
pub struct YearRange {
    start: Year,
    end: Year,
}

/// Unchecked wire form of [`YearRange`].
#[derive(Deserialize)]
struct YearBounds {
    start: Year,
    end: Year,
}

impl TryFrom<YearBounds> for YearRange {
    type Error = FrameError;

    fn try_from(bounds: YearBounds) -> Result<Self, FrameError> {
        Self::new(bounds.start, bounds.end)
    }
}

impl YearRange {
    pub fn new(start: Year, end: Year) -> Result<Self, FrameError> {
        if start > end {
            return Err(FrameError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Year {
        self.start
    }

    pub fn end(&self) -> Year {
        self.end
    }

    pub fn len(&self) -> usize {
        (i64::from(self.end) - i64::from(self.start) + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn years(&self) -> impl Iterator<Item = Year> {
        self.start..=self.end
    }
}

/// A known-history row fed to the forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRow {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    pub series_id: String,
}

/// Known history of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFrame {
    pub target: Target,
    pub rows: Vec<ContextRow>,
}

impl ContextFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A timestamp the forecaster must predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureRow {
    pub timestamp: NaiveDateTime,
    pub series_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureFrame {
    pub rows: Vec<FutureRow>,
}

impl FutureFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// How frame columns are named on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBindings {
    pub id_column: String,
    pub timestamp_column: String,
    pub target: Target,
}

impl ColumnBindings {
    pub fn new(target: Target) -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.into(),
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.into(),
            target,
        }
    }

    pub fn with_columns(
        mut self,
        id_column: impl Into<String>,
        timestamp_column: impl Into<String>,
    ) -> Self {
        self.id_column = id_column.into();
        self.timestamp_column = timestamp_column.into();
        self
    }
}
