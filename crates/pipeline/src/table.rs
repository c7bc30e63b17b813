//! CSV tables: the original dataset, the quantile-choice tables, and the
//! reconciled output.

use std::path::{Path, PathBuf};

use gapfill_core::choice::{QuantileChoice, is_missing_marker};
use gapfill_core::error::{Error, TableError};
use gapfill_core::series::{Dataset, Number, Row, Target, Year};
use tracing::debug;

pub const YEAR_COLUMN: &str = "Year";
pub const CHOSEN_QUANTILE_COLUMN: &str = "chosen_quantile";

/// Header index lookup that reports which table lacks the column.
fn column_index(table: &str, headers: &csv::StringRecord, column: &str) -> Result<usize, TableError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| TableError::MissingColumn {
            table: table.into(),
            column: column.into(),
        })
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

fn read_error(table: &str, e: csv::Error) -> TableError {
    TableError::Read {
        table: table.into(),
        reason: e.to_string(),
    }
}

fn line_of(record: &csv::StringRecord, idx: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(idx + 2)
}

fn parse_year(table: &str, raw: &str, line: usize) -> Result<Year, TableError> {
    raw.parse::<Year>().map_err(|_| TableError::InvalidValue {
        table: table.into(),
        column: YEAR_COLUMN.into(),
        line,
        value: raw.into(),
    })
}

/// Parse the original `(Year, Hare, Lynx)` dataset. Extra columns are ignored.
pub fn parse_dataset(table: &str, content: &str) -> Result<Dataset, TableError> {
    let mut rdr = reader(content);
    let headers = rdr.headers().map_err(|e| read_error(table, e))?.clone();

    let year_idx = column_index(table, &headers, YEAR_COLUMN)?;
    let hare_idx = column_index(table, &headers, Target::Hare.column())?;
    let lynx_idx = column_index(table, &headers, Target::Lynx.column())?;

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| read_error(table, e))?;
        let line = line_of(&record, idx);

        let year = parse_year(table, record.get(year_idx).unwrap_or(""), line)?;
        let cell = |i: usize, column: &str| -> Result<Option<Number>, TableError> {
            let raw = record.get(i).unwrap_or("");
            if is_missing_marker(raw) {
                return Ok(None);
            }
            Number::parse(raw)
                .map(Some)
                .ok_or_else(|| TableError::InvalidValue {
                    table: table.into(),
                    column: column.into(),
                    line,
                    value: raw.into(),
                })
        };

        rows.push(Row::new(
            year,
            cell(hare_idx, Target::Hare.column())?,
            cell(lynx_idx, Target::Lynx.column())?,
        ));
    }

    Ok(Dataset::new(rows))
}

/// Parse a `(Year, chosen_quantile)` table.
pub fn parse_choices(table: &str, content: &str) -> Result<QuantileChoice, TableError> {
    let mut rdr = reader(content);
    let headers = rdr.headers().map_err(|e| read_error(table, e))?.clone();

    let year_idx = column_index(table, &headers, YEAR_COLUMN)?;
    let label_idx = column_index(table, &headers, CHOSEN_QUANTILE_COLUMN)?;

    let mut choice = QuantileChoice::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| read_error(table, e))?;
        let line = line_of(&record, idx);
        let year = parse_year(table, record.get(year_idx).unwrap_or(""), line)?;
        choice.insert_raw(table, year, record.get(label_idx).unwrap_or(""))?;
    }
    Ok(choice)
}

async fn read_text(path: &Path) -> Result<String, Error> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Table(TableError::Read {
            table: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

pub async fn read_dataset(path: &Path) -> Result<Dataset, Error> {
    let content = read_text(path).await?;
    let dataset = parse_dataset(&path.display().to_string(), &content)?;
    debug!(path = %path.display(), rows = dataset.len(), "Loaded dataset");
    Ok(dataset)
}

pub async fn read_choices(path: &Path) -> Result<QuantileChoice, Error> {
    let content = read_text(path).await?;
    let choice = parse_choices(&path.display().to_string(), &content)?;
    debug!(
        path = %path.display(),
        entries = choice.len(),
        defined = choice.defined(),
        "Loaded quantile choices"
    );
    Ok(choice)
}

/// Serialize a dataset as `Year,Hare,Lynx` CSV. Absent cells are empty.
pub fn write_dataset(dataset: &Dataset) -> Result<Vec<u8>, Error> {
    let encode = |e: csv::Error| Error::Internal(format!("CSV encoding failed: {e}"));
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record([YEAR_COLUMN, Target::Hare.column(), Target::Lynx.column()])
        .map_err(encode)?;

    let cell = |n: Option<Number>| n.map(|v| v.to_string()).unwrap_or_default();
    for row in dataset.rows() {
        writer
            .write_record([row.year.to_string(), cell(row.hare), cell(row.lynx)])
            .map_err(encode)?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV encoding failed: {e}")))
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Temporary sibling used by [`write_atomic`].
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `bytes` to `path` via a temporary sibling and a rename, so readers
/// see either the old file or the complete new one.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}
