pub mod catalog;
pub mod config;
pub mod snapshot;

use schemars::JsonSchema;
use schemars::Schema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use catalog::{MEDICINE_CATEGORIES, MEDICINE_FORMS, MedicineRecord, NOT_FOUND, SearchableField};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, alias = "form_filter", skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u64>,
}

impl SearchFilters {
    /// Blank categorical values mean "no filter", matching what a form submits
    /// for an untouched dropdown.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            category: non_blank(self.category),
            form: non_blank(self.form),
            ..self
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.form.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_quantity.is_none()
            && self.max_quantity.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default, alias = "topK", skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MedicineHit {
    #[serde(flatten)]
    pub record: MedicineRecord,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<MedicineHit>,
    pub total: usize,
}

impl SearchResponse {
    #[must_use]
    pub fn from_hits(results: Vec<MedicineHit>) -> Self {
        let total = results.len();
        Self { results, total }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AdviseRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchemaBundle {
    pub search_request: Schema,
    pub search_response: Schema,
    pub advise_request: Schema,
    pub medicine_record: Schema,
}

pub fn schema_bundle() -> SchemaBundle {
    SchemaBundle {
        search_request: schemars::schema_for!(SearchRequest),
        search_response: schemars::schema_for!(SearchResponse),
        advise_request: schemars::schema_for!(AdviseRequest),
        medicine_record: schemars::schema_for!(MedicineRecord),
    }
}

/// Short stable digest used in logs instead of the raw query text.
pub fn query_fingerprint(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    format!("{digest:x}")[..12].to_string()
}
