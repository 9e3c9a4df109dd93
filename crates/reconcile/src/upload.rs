use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Header names an upload must carry, with the snake_case spelling accepted
/// as an alternative.
pub const REQUIRED_COLUMNS: [(&str, &str); 4] = [
    ("Batch_ID", "batch_id"),
    ("Name of Medicine", "name"),
    ("Price_INR", "price"),
    ("Total_Quantity", "total_quantity"),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("missing required columns in uploaded file: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("uploaded file must be a JSON array of row objects")]
    NotAnArray,
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// One line of an operator's inventory upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRow {
    pub batch_id: String,
    pub name: String,
    pub price: Option<f64>,
    pub total_quantity: Option<u64>,
}

impl UploadRow {
    pub fn key(&self) -> (&str, &str) {
        (&self.batch_id, &self.name)
    }
}

pub fn parse_upload(raw: &str) -> Result<Vec<UploadRow>, ReconcileError> {
    let value: Value = serde_json::from_str(raw).map_err(|err| ReconcileError::InvalidRow {
        row: 0,
        message: err.to_string(),
    })?;
    let Value::Array(items) = value else {
        return Err(ReconcileError::NotAnArray);
    };
    let rows = items
        .into_iter()
        .enumerate()
        .map(|(row, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(ReconcileError::InvalidRow {
                row,
                message: "expected an object".to_string(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    validate_upload(&rows)
}

/// Checks the column set, then converts each row. A column counts as
/// present when any row carries it, the way a spreadsheet header does.
pub fn validate_upload(rows: &[Map<String, Value>]) -> Result<Vec<UploadRow>, ReconcileError> {
    let present = rows.iter().flat_map(Map::keys).map(String::as_str).collect::<BTreeSet<_>>();
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|(header, alias)| !present.contains(header) && !present.contains(alias))
        .map(|(header, _)| (*header).to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ReconcileError::MissingColumns(missing));
    }

    rows.iter()
        .enumerate()
        .map(|(row, map)| {
            let batch_id = text(lookup(map, REQUIRED_COLUMNS[0]));
            let name = text(lookup(map, REQUIRED_COLUMNS[1]));
            if batch_id.is_empty() || name.is_empty() {
                return Err(ReconcileError::InvalidRow {
                    row,
                    message: "batch id and medicine name are required".to_string(),
                });
            }
            Ok(UploadRow {
                batch_id,
                name,
                price: number(lookup(map, REQUIRED_COLUMNS[2])),
                total_quantity: quantity(lookup(map, REQUIRED_COLUMNS[3])),
            })
        })
        .collect()
}

fn lookup<'a>(map: &'a Map<String, Value>, (header, alias): (&str, &str)) -> Option<&'a Value> {
    map.get(header).or_else(|| map.get(alias)).filter(|v| !v.is_null())
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantity(value: Option<&Value>) -> Option<u64> {
    number(value).filter(|v| *v >= 0.0).map(|v| v.round() as u64)
}
