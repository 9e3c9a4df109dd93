use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use crate::catalog::MedicineRecord;

/// One catalog row as stored in a snapshot file, with the embedding columns
/// split away from the record fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub record: MedicineRecord,
    pub vectors: BTreeMap<String, Vec<f32>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed reading snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("row {row}: invalid json: {message}")]
    Parse { row: usize, message: String },
    #[error("row {row}: expected an object")]
    NotAnObject { row: usize },
    #[error("row {row}: embedding column `{column}` is missing")]
    MissingEmbedding { row: usize, column: String },
    #[error("row {row}: embedding column `{column}` is not an array of numbers")]
    InvalidEmbedding { row: usize, column: String },
}

/// Anything that can hand the search layer a full catalog snapshot.
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<Vec<SnapshotRow>, SnapshotError>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct JsonSnapshotSource {
    path: PathBuf,
    columns: Vec<String>,
}

impl JsonSnapshotSource {
    pub fn new(path: impl Into<PathBuf>, columns: Vec<String>) -> Self {
        Self {
            path: path.into(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonSnapshotSource {
    fn load(&self) -> Result<Vec<SnapshotRow>, SnapshotError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SnapshotError::Read {
            path: self.path.clone(),
            source,
        })?;
        parse_snapshot(&raw, &self.columns)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parses either a JSON array of rows or JSON Lines.
///
/// Embedding columns are looked up at the top level first and then inside an
/// `embeddings` object.
pub fn parse_snapshot(raw: &str, columns: &[String]) -> Result<Vec<SnapshotRow>, SnapshotError> {
    let trimmed = raw.trim_start();
    let values = if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<Value>>(trimmed) {
            Ok(values) => values,
            Err(err) => {
                return Err(SnapshotError::Parse {
                    row: err.line(),
                    message: err.to_string(),
                });
            }
        }
    } else {
        let mut values = Vec::new();
        for (row, line) in trimmed.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value = serde_json::from_str::<Value>(line).map_err(|err| SnapshotError::Parse {
                row,
                message: err.to_string(),
            })?;
            values.push(value);
        }
        values
    };

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| split_row(row, value, columns))
        .collect()
}

fn split_row(row: usize, value: Value, columns: &[String]) -> Result<SnapshotRow, SnapshotError> {
    let Value::Object(mut fields) = value else {
        return Err(SnapshotError::NotAnObject { row });
    };
    let mut nested = match fields.remove("embeddings") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let mut vectors = BTreeMap::new();
    for column in columns {
        let raw = fields
            .remove(column)
            .or_else(|| nested.remove(column))
            .ok_or_else(|| SnapshotError::MissingEmbedding {
                row,
                column: column.clone(),
            })?;
        let vector = serde_json::from_value::<Vec<f32>>(raw).map_err(|_| {
            SnapshotError::InvalidEmbedding {
                row,
                column: column.clone(),
            }
        })?;
        vectors.insert(column.clone(), vector);
    }

    let record = serde_json::from_value::<MedicineRecord>(Value::Object(fields)).map_err(|err| {
        SnapshotError::Parse {
            row,
            message: err.to_string(),
        }
    })?;
    Ok(SnapshotRow { record, vectors })
}

/// Pretty-prints `value` as JSON to `path`, creating parent directories.
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
