use std::sync::LazyLock;

use common::MedicineRecord;
use regex::Regex;

static BATCH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^BATCH_[0-9]+$").expect("batch id pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Empty,
    BatchId,
    FreeText,
}

pub fn classify(query: &str) -> QueryKind {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        QueryKind::Empty
    } else if BATCH_ID.is_match(trimmed) {
        QueryKind::BatchId
    } else {
        QueryKind::FreeText
    }
}

/// Catalog positions whose batch id contains `query`, ignoring case, in
/// catalog order.
pub fn batch_id_matches(records: &[MedicineRecord], query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.batch_id.to_lowercase().contains(&needle))
        .map(|(position, _)| position)
        .collect()
}
