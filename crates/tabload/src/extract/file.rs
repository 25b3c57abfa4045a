//! Flat-file extractor.
//!
//! A full-materialization read: the whole file is loaded into memory and
//! returned as one record sequence. Streaming would be a future improvement;
//! the current contract is all-at-once.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use calamine::{open_workbook, Data, Reader as SheetReader, Xlsx};
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::RawRecord;

/// Closed set of recognized file format tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Xlsx,
    Parquet,
}

impl FromStr for FileFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "xlsx" => Ok(FileFormat::Xlsx),
            "parquet" => Ok(FileFormat::Parquet),
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "csv"),
            FileFormat::Json => write!(f, "json"),
            FileFormat::Xlsx => write!(f, "xlsx"),
            FileFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// Read a whole file into a record sequence. `path` is resolved against
/// `root`; a missing file is [`PipelineError::NotFound`].
pub fn read_file(root: &Path, path: &str, format: FileFormat) -> Result<Vec<RawRecord>> {
    let file_path = root.join(path);
    if !file_path.exists() {
        return Err(PipelineError::NotFound(file_path));
    }

    let records = match format {
        FileFormat::Csv => read_csv(&file_path),
        FileFormat::Json => read_json(&file_path),
        FileFormat::Xlsx => read_xlsx(&file_path),
        FileFormat::Parquet => read_parquet(&file_path),
    }?;

    debug!("Read {} records from {:?} ({})", records.len(), file_path, format);
    Ok(records)
}

fn read_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = RawRecord::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            // Empty cells are treated as absent, not as empty strings
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::from(cell)
            };
            record.insert(header.to_string(), value);
        }
        records.push(record);
    }
    Ok(records)
}

fn read_json(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(file)?;

    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(PipelineError::extraction(
                "file",
                path.display().to_string(),
                "expected a top-level JSON array of objects",
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(PipelineError::extraction(
                "file",
                format!("{} item {}", path.display(), i),
                "expected a JSON object",
            )),
        })
        .collect()
}

fn read_xlsx(path: &Path) -> Result<Vec<RawRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            PipelineError::extraction("file", path.display().to_string(), "workbook has no sheets")
        })??;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for row in rows {
        let mut record = RawRecord::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), cell_to_value(cell));
        }
        records.push(record);
    }
    Ok(records)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::from(s.as_str()),
        Data::Int(i) => Value::from(*i),
        // Excel stores integers as floats; keep whole numbers integral
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(*f as i64),
        Data::Float(f) => Value::from(*f),
        Data::Bool(b) => Value::from(*b),
        Data::DateTime(dt) => Value::from(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::from(s.as_str()),
    }
}

fn read_parquet(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;

    let mut records = Vec::new();
    for row in reader.get_row_iter(None)? {
        let row = row?;
        match row.to_json_value() {
            Value::Object(record) => records.push(record),
            _ => {
                return Err(PipelineError::extraction(
                    "file",
                    path.display().to_string(),
                    "parquet row did not decode to an object",
                ))
            }
        }
    }
    Ok(records)
}
