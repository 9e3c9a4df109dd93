use std::collections::HashMap;

use common::MedicineRecord;
use llm::{AttributeExtractor, ExtractedAttributes};
use serde::{Deserialize, Serialize};

use crate::upload::UploadRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    #[serde(rename = "updated price & quantity")]
    Updated,
    #[serde(rename = "new item added")]
    Added,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    #[serde(flatten)]
    pub record: MedicineRecord,
    pub status_import: ImportStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub rows: Vec<ReconciledRow>,
    /// New items whose attributes could not be extracted.
    pub fallbacks: usize,
}

impl ReconcileReport {
    pub fn updated(&self) -> usize {
        self.count(ImportStatus::Updated)
    }

    pub fn added(&self) -> usize {
        self.count(ImportStatus::Added)
    }

    fn count(&self, status: ImportStatus) -> usize {
        self.rows.iter().filter(|r| r.status_import == status).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub updated: usize,
    pub inserted: usize,
}

/// Joins an upload against the catalog on (batch id, name).
///
/// Matched rows take the uploaded price when one is given and add the
/// uploaded quantity to stock. Unmatched rows become new items whose
/// descriptive attributes come from `extractor`, or placeholders when no
/// extractor is configured. Output follows the upload's batch id order.
pub async fn reconcile(
    catalog: &[MedicineRecord],
    upload: &[UploadRow],
    extractor: Option<&AttributeExtractor>,
) -> ReconcileReport {
    let by_key = catalog
        .iter()
        .rev()
        .map(|record| ((record.batch_id.as_str(), record.name.as_str()), record))
        .collect::<HashMap<_, _>>();

    let mut report = ReconcileReport::default();
    for row in upload {
        let record = if let Some(existing) = by_key.get(&row.key()) {
            ReconciledRow {
                record: MedicineRecord {
                    price: row.price.unwrap_or(existing.price),
                    total_quantity: existing
                        .total_quantity
                        .saturating_add(row.total_quantity.unwrap_or(0)),
                    ..(*existing).clone()
                },
                status_import: ImportStatus::Updated,
            }
        } else {
            let attributes = match extractor {
                Some(extractor) => {
                    let outcome = extractor.extract_with_retries(&row.batch_id, &row.name).await;
                    if outcome.is_fallback() {
                        report.fallbacks += 1;
                    }
                    outcome.into_attributes()
                }
                None => {
                    report.fallbacks += 1;
                    ExtractedAttributes::not_found()
                }
            };
            ReconciledRow {
                record: attributes.into_record(
                    &row.batch_id,
                    &row.name,
                    row.price.unwrap_or_default(),
                    row.total_quantity.unwrap_or(0),
                ),
                status_import: ImportStatus::Added,
            }
        };
        report.rows.push(record);
    }

    let mut order = HashMap::new();
    for (position, row) in upload.iter().enumerate() {
        order.entry(row.batch_id.as_str()).or_insert(position);
    }
    report
        .rows
        .sort_by_key(|r| order.get(r.record.batch_id.as_str()).copied().unwrap_or(usize::MAX));

    tracing::info!(
        updated = report.updated(),
        added = report.added(),
        fallbacks = report.fallbacks,
        "inventory reconciled"
    );
    report
}

/// Upserts reconciled rows into `catalog` keyed by (batch id, name).
pub fn apply_to_catalog(catalog: &mut Vec<MedicineRecord>, report: &ReconcileReport) -> ApplySummary {
    let mut summary = ApplySummary::default();
    for row in &report.rows {
        let existing = catalog
            .iter_mut()
            .find(|r| r.batch_id == row.record.batch_id && r.name == row.record.name);
        if let Some(existing) = existing {
            *existing = row.record.clone();
            summary.updated += 1;
        } else {
            catalog.push(row.record.clone());
            summary.inserted += 1;
        }
    }
    summary
}
