//! The original predator/prey dataset and its column model.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Calendar year; the key of every table in the pipeline.
pub type Year = i32;

/// One of the two tracked populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    /// Snowshoe hare, the prey series.
    Hare,
    /// Canada lynx, the predator series.
    Lynx,
}

impl Target {
    /// Both targets, in output column order.
    pub const ALL: [Target; 2] = [Target::Hare, Target::Lynx];

    /// Column name in every table (`"Hare"` / `"Lynx"`).
    pub fn column(&self) -> &'static str {
        match self {
            Self::Hare => "Hare",
            Self::Lynx => "Lynx",
        }
    }

    /// Ecological role, accepted as an alias when parsing.
    pub fn role(&self) -> &'static str {
        match self {
            Self::Hare => "prey",
            Self::Lynx => "predator",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| key == t.column().to_ascii_lowercase() || key == t.role())
            .ok_or_else(|| format!("unknown target '{key}' (expected hare or lynx)"))
    }
}

/// Storage type of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int,
    Float,
}

impl ColumnType {
    /// The narrowest type both columns coerce into.
    pub fn supertype(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (ColumnType::Int, ColumnType::Int) => ColumnType::Int,
            _ => ColumnType::Float,
        }
    }
}

/// A single numeric cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Number::Int(_) => ColumnType::Int,
            Number::Float(_) => ColumnType::Float,
        }
    }

    /// Re-express the cell in a (wider) column type.
    pub fn coerce(self, to: ColumnType) -> Number {
        match (self, to) {
            (Number::Int(v), ColumnType::Float) => Number::Float(v as f64),
            (n, _) => n,
        }
    }

    /// Parse a textual cell, preferring integers.
    pub fn parse(raw: &str) -> Option<Number> {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            return Some(Number::Int(v));
        }
        raw.parse::<f64>().ok().map(Number::Float)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Number::Int(v) => write!(f, "{v}"),
            // Whole floats keep a trailing ".0" so the column type survives a round trip.
            Number::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One historical data point of a single series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: Year,
    pub value: Option<Number>,
}

/// One `(Year, Hare, Lynx)` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub year: Year,
    pub hare: Option<Number>,
    pub lynx: Option<Number>,
}

impl Row {
    pub fn new(year: Year, hare: Option<Number>, lynx: Option<Number>) -> Self {
        Self { year, hare, lynx }
    }

    pub fn get(&self, target: Target) -> Option<Number> {
        match target {
            Target::Hare => self.hare,
            Target::Lynx => self.lynx,
        }
    }
}

/// A wide `(Year, Hare, Lynx)` table with typed value columns.
///
/// Used both for the original dataset and for the reconciled output. Row
/// order is preserved exactly as given; nothing here sorts or de-duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    rows: Vec<Row>,
    hare_type: ColumnType,
    lynx_type: ColumnType,
}

impl Dataset {
    /// Build a dataset, inferring each column's type from its cells.
    ///
    /// A column is `Int` unless at least one present cell is a float.
    pub fn new(rows: Vec<Row>) -> Self {
        let infer = |target: Target| {
            rows.iter()
                .filter_map(|r| r.get(target))
                .map(|n| n.column_type())
                .fold(ColumnType::Int, ColumnType::supertype)
        };
        let hare_type = infer(Target::Hare);
        let lynx_type = infer(Target::Lynx);
        Self::with_types(rows, hare_type, lynx_type)
    }

    /// Build a dataset with explicit column types; cells are coerced up.
    pub fn with_types(rows: Vec<Row>, hare_type: ColumnType, lynx_type: ColumnType) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| Row {
                year: r.year,
                hare: r.hare.map(|n| n.coerce(hare_type)),
                lynx: r.lynx.map(|n| n.coerce(lynx_type)),
            })
            .collect();
        Self {
            rows,
            hare_type,
            lynx_type,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_type(&self, target: Target) -> ColumnType {
        match target {
            Target::Hare => self.hare_type,
            Target::Lynx => self.lynx_type,
        }
    }

    /// All observations of one series, in row order.
    pub fn observations(&self, target: Target) -> impl Iterator<Item = Observation> + '_ {
        self.rows.iter().map(move |r| Observation {
            year: r.year,
            value: r.get(target),
        })
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.rows.iter().map(|r| r.year)
    }

    /// First row for a year, if any.
    pub fn find(&self, year: Year) -> Option<&Row> {
        self.rows.iter().find(|r| r.year == year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parses_roles_and_names() {
        assert_eq!("hare".parse::<Target>().unwrap(), Target::Hare);
        assert_eq!("Predator".parse::<Target>().unwrap(), Target::Lynx);
        assert!("wolf".parse::<Target>().is_err());
        assert_eq!(Target::Lynx.to_string(), "Lynx");
    }

    #[test]
    fn number_parse_prefers_int() {
        assert_eq!(Number::parse("42"), Some(Number::Int(42)));
        assert_eq!(Number::parse(" 47.2 "), Some(Number::Float(47.2)));
        assert_eq!(Number::parse("n/a"), None);
    }

    #[test]
    fn whole_floats_keep_decimal_point() {
        assert_eq!(Number::Float(42.0).to_string(), "42.0");
        assert_eq!(Number::Float(47.2).to_string(), "47.2");
        assert_eq!(Number::Int(42).to_string(), "42");
    }

    #[test]
    fn dataset_infers_column_types() {
        let ds = Dataset::new(vec![
            Row::new(1900, Some(Number::Int(30)), Some(Number::Float(4.5))),
            Row::new(1901, None, Some(Number::Int(6))),
        ]);
        assert_eq!(ds.column_type(Target::Hare), ColumnType::Int);
        assert_eq!(ds.column_type(Target::Lynx), ColumnType::Float);
        // Int cells in a float column are widened.
        assert_eq!(ds.rows()[1].lynx, Some(Number::Float(6.0)));
    }

    #[test]
    fn observations_keep_absent_values() {
        let ds = Dataset::new(vec![
            Row::new(1900, Some(Number::Int(30)), None),
            Row::new(1901, None, Some(Number::Int(6))),
        ]);
        let hare: Vec<_> = ds.observations(Target::Hare).collect();
        assert_eq!(hare.len(), 2);
        assert!(hare[1].value.is_none());
    }

    #[test]
    fn supertype_is_symmetric() {
        use ColumnType::*;
        assert_eq!(Int.supertype(Float), Float);
        assert_eq!(Float.supertype(Int), Float);
        assert_eq!(Int.supertype(Int), Int);
    }
}
