//! Externally calibrated per-year quantile choices.
//!
//! A choice table maps a year to the label of the quantile column that best
//! matched ground truth for that year. Two kinds of "no choice" exist and are
//! kept apart:
//! - the year has an entry carrying the missing marker → the year is imputed
//!   as null;
//! - the year has no entry at all → the year is dropped by the choice join.

use std::collections::BTreeMap;

use crate::error::TableError;
use crate::series::Year;

/// Cell spellings treated as "no chosen quantile" (compared case-insensitively).
pub const MISSING_MARKERS: &[&str] = &["", "nan", "na", "n/a", "null", "none"];

pub fn is_missing_marker(raw: &str) -> bool {
    let trimmed = raw.trim().to_ascii_lowercase();
    MISSING_MARKERS.contains(&trimmed.as_str())
}

/// Year → chosen quantile label (or the missing marker).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantileChoice {
    entries: BTreeMap<Year, Option<String>>,
}

impl QuantileChoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(year, raw cell)` pairs; duplicate years are rejected.
    pub fn from_raw<I, S>(table: &str, cells: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (Year, S)>,
        S: AsRef<str>,
    {
        let mut choice = Self::new();
        for (year, raw) in cells {
            choice.insert_raw(table, year, raw.as_ref())?;
        }
        Ok(choice)
    }

    /// Insert one raw cell, normalizing missing markers to `None`.
    pub fn insert_raw(&mut self, table: &str, year: Year, raw: &str) -> Result<(), TableError> {
        let label = if is_missing_marker(raw) {
            None
        } else {
            Some(raw.trim().to_string())
        };
        if self.entries.insert(year, label).is_some() {
            return Err(TableError::DuplicateYear {
                table: table.into(),
                year,
            });
        }
        Ok(())
    }

    /// Whether the year appears in the table at all.
    pub fn has_entry(&self, year: Year) -> bool {
        self.entries.contains_key(&year)
    }

    /// The defined label for a year; `None` for missing entries and missing markers.
    pub fn label(&self, year: Year) -> Option<&str> {
        self.entries.get(&year).and_then(|l| l.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries carrying a defined label.
    pub fn defined(&self) -> usize {
        self.entries.values().filter(|l| l.is_some()).count()
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.entries.keys().copied()
    }
}
