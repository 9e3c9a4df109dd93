pub mod join;
pub mod upload;

pub use join::{ApplySummary, ImportStatus, ReconcileReport, ReconciledRow, apply_to_catalog, reconcile};
pub use upload::{REQUIRED_COLUMNS, ReconcileError, UploadRow, parse_upload, validate_upload};
