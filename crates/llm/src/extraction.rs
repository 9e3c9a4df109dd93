use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use common::{MedicineRecord, NOT_FOUND};
use serde::{Deserialize, Serialize};

use crate::{
    gemini::{GenerationRequest, TextGenerator, strip_code_fences},
    prompts,
};

/// Descriptive attributes of a medicine as returned by the extraction model.
/// Batch id and name are absent; the uploaded values win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedAttributes {
    #[serde(alias = "Category")]
    pub category: String,
    #[serde(alias = "Medicine Forms")]
    pub form: String,
    #[serde(alias = "Quantity_per_pack")]
    pub quantity_per_pack: String,
    #[serde(alias = "Cover Disease")]
    pub cover_disease: String,
    #[serde(alias = "Symptoms")]
    pub symptoms: String,
    #[serde(alias = "Side Effects")]
    pub side_effects: String,
    #[serde(alias = "Instructions")]
    pub instructions: String,
    #[serde(alias = "Description in Hinglish")]
    pub description: String,
}

impl Default for ExtractedAttributes {
    fn default() -> Self {
        Self::not_found()
    }
}

impl ExtractedAttributes {
    pub fn not_found() -> Self {
        Self {
            category: NOT_FOUND.to_string(),
            form: NOT_FOUND.to_string(),
            quantity_per_pack: NOT_FOUND.to_string(),
            cover_disease: NOT_FOUND.to_string(),
            symptoms: NOT_FOUND.to_string(),
            side_effects: NOT_FOUND.to_string(),
            instructions: NOT_FOUND.to_string(),
            description: NOT_FOUND.to_string(),
        }
    }

    pub fn into_record(self, batch_id: &str, name: &str, price: f64, total_quantity: u64) -> MedicineRecord {
        MedicineRecord {
            batch_id: batch_id.to_string(),
            name: name.to_string(),
            category: self.category,
            form: self.form,
            price,
            quantity_per_pack: self.quantity_per_pack,
            total_quantity,
            cover_disease: self.cover_disease,
            symptoms: self.symptoms,
            side_effects: self.side_effects,
            instructions: self.instructions,
            description: self.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted(ExtractedAttributes),
    /// Every attempt failed; attributes are all placeholders.
    Fallback { reason: String },
}

impl ExtractionOutcome {
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn into_attributes(self) -> ExtractedAttributes {
        match self {
            Self::Extracted(attributes) => attributes,
            Self::Fallback { .. } => ExtractedAttributes::not_found(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Two-stage attribute lookup: grounded research text, then a strict JSON
/// extraction over that text.
#[derive(Clone)]
pub struct AttributeExtractor {
    generator: Arc<dyn TextGenerator>,
    research_model: String,
    extraction_model: String,
    policy: RetryPolicy,
}

impl AttributeExtractor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        research_model: impl Into<String>,
        extraction_model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            research_model: research_model.into(),
            extraction_model: extraction_model.into(),
            policy,
        }
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Never fails: after `max_retries` unsuccessful extraction attempts the
    /// outcome is [`ExtractionOutcome::Fallback`].
    pub async fn extract_with_retries(&self, batch_id: &str, medicine_name: &str) -> ExtractionOutcome {
        let raw_text = match self.research(medicine_name).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(batch_id, error = %err, "medicine research failed");
                return ExtractionOutcome::Fallback {
                    reason: format!("research failed: {err}"),
                };
            }
        };

        let attempts = self.policy.max_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.extract_once(batch_id, medicine_name, &raw_text).await {
                Ok(attributes) => return ExtractionOutcome::Extracted(attributes),
                Err(err) => {
                    tracing::warn!(batch_id, attempt, error = %err, "attribute extraction attempt failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }
        tracing::warn!(batch_id, attempts, "all extraction attempts failed; using placeholders");
        ExtractionOutcome::Fallback { reason: last_error }
    }

    async fn research(&self, medicine_name: &str) -> Result<String> {
        let prompt = prompts::research_prompt(medicine_name);
        self.generator
            .generate(GenerationRequest {
                model: &self.research_model,
                prompt: &prompt,
                grounded: true,
            })
            .await
    }

    async fn extract_once(&self, batch_id: &str, medicine_name: &str, raw_text: &str) -> Result<ExtractedAttributes> {
        let prompt = prompts::extraction_prompt(batch_id, medicine_name, raw_text);
        let reply = self
            .generator
            .generate(GenerationRequest {
                model: &self.extraction_model,
                prompt: &prompt,
                grounded: false,
            })
            .await?;
        serde_json::from_str(strip_code_fences(&reply)).context("extraction reply is not the expected JSON object")
    }
}
