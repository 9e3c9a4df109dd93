use std::sync::Arc;

use common::MedicineRecord;
use serde::Serialize;
use serde_json::Value;

use crate::{
    gemini::{GenerationRequest, TextGenerator, strip_code_fences},
    prompts,
};

/// Neighbours handed to the model for one advice request.
pub const ADVISOR_NEIGHBOURS: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("No matching medicines found.")]
    NoCandidates,
    #[error("Invalid response format from AI.")]
    InvalidResponse,
    #[error("Failed to process AI response.")]
    Upstream(#[source] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct AdvisorRecord<'a> {
    #[serde(rename = "Batch_ID")]
    batch_id: &'a str,
    combined_text: String,
    #[serde(rename = "Price_INR")]
    price: f64,
    #[serde(rename = "Quantity_per_pack")]
    quantity_per_pack: &'a str,
}

impl<'a> From<&'a MedicineRecord> for AdvisorRecord<'a> {
    fn from(record: &'a MedicineRecord) -> Self {
        let combined_text = [
            record.name.as_str(),
            record.category.as_str(),
            record.form.as_str(),
            record.cover_disease.as_str(),
            record.symptoms.as_str(),
            record.side_effects.as_str(),
            record.instructions.as_str(),
            record.description.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
        Self {
            batch_id: &record.batch_id,
            combined_text,
            price: record.price,
            quantity_per_pack: &record.quantity_per_pack,
        }
    }
}

/// Turns a symptom description plus nearby catalog records into a
/// structured recommendation.
#[derive(Clone)]
pub struct SymptomAdvisor {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl SymptomAdvisor {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    pub async fn advise(&self, query: &str, candidates: &[MedicineRecord]) -> Result<Value, AdvisorError> {
        if candidates.is_empty() {
            return Err(AdvisorError::NoCandidates);
        }
        let records = candidates.iter().map(AdvisorRecord::from).collect::<Vec<_>>();
        let records_json = serde_json::to_string(&records).map_err(|err| AdvisorError::Upstream(err.into()))?;
        let prompt = prompts::advisor_prompt(query, &records_json);
        let reply = self
            .generator
            .generate(GenerationRequest {
                model: &self.model,
                prompt: &prompt,
                grounded: false,
            })
            .await
            .map_err(AdvisorError::Upstream)?;
        serde_json::from_str(strip_code_fences(&reply)).map_err(|err| {
            tracing::warn!(error = %err, "advisor reply was not valid JSON");
            AdvisorError::InvalidResponse
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{Result, anyhow};
    use common::MedicineRecord;
    use futures::future::BoxFuture;

    use super::{AdvisorError, AdvisorRecord, SymptomAdvisor};
    use crate::gemini::{GenerationRequest, TextGenerator};

    struct Canned {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl TextGenerator for Canned {
        fn generate<'a>(&'a self, request: GenerationRequest<'a>) -> BoxFuture<'a, Result<String>> {
            self.prompts.lock().expect("lock").push(request.prompt.to_string());
            let reply = self.reply.clone().map_err(|e| anyhow!(e));
            Box::pin(async move { reply })
        }
    }

    fn canned(reply: Result<&str, &str>) -> Arc<Canned> {
        Arc::new(Canned {
            reply: reply.map(str::to_string).map_err(str::to_string),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn cyclopam() -> MedicineRecord {
        MedicineRecord {
            batch_id: "BATCH_101".to_string(),
            name: "Cyclopam".to_string(),
            category: "Antispasmodics".to_string(),
            price: 25.0,
            quantity_per_pack: "10 Tablets".to_string(),
            symptoms: "stomach pain, cramps".to_string(),
            ..MedicineRecord::default()
        }
    }

    #[tokio::test]
    async fn no_candidates_skips_the_model() {
        let generator = canned(Ok("{}"));
        let advisor = SymptomAdvisor::new(Arc::clone(&generator) as Arc<dyn TextGenerator>, "gemini-2.5-flash");
        let err = advisor.advise("stomach ache", &[]).await.expect_err("no candidates");
        assert_eq!(err.to_string(), "No matching medicines found.");
        assert!(generator.prompts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn fenced_json_reply_is_returned_as_value() {
        let generator = canned(Ok(
            "```json\n{\"AI Response\": \"This person has stomach pain issue\", \"Medicines\": [{\"S.no\": 1, \"Name\": \"Cyclopam\"}], \"Score\": \"90%\"}\n```",
        ));
        let advisor = SymptomAdvisor::new(Arc::clone(&generator) as Arc<dyn TextGenerator>, "gemini-2.5-flash");
        let value = advisor.advise("stomach ache", &[cyclopam()]).await.expect("advice");
        assert_eq!(value["Medicines"][0]["Name"], "Cyclopam");
        let prompts = generator.prompts.lock().expect("lock");
        assert!(prompts[0].contains("\"Batch_ID\":\"BATCH_101\""));
        assert!(prompts[0].contains("Patient Query: stomach ache"));
    }

    #[tokio::test]
    async fn prose_reply_is_an_invalid_format() {
        let advisor = SymptomAdvisor::new(canned(Ok("Take rest and drink water.")), "gemini-2.5-flash");
        let err = advisor.advise("stomach ache", &[cyclopam()]).await.expect_err("invalid");
        assert!(matches!(err, AdvisorError::InvalidResponse));
        assert_eq!(err.to_string(), "Invalid response format from AI.");
    }

    #[tokio::test]
    async fn model_failure_is_upstream_error() {
        let advisor = SymptomAdvisor::new(canned(Err("quota exceeded")), "gemini-2.5-flash");
        let err = advisor.advise("stomach ache", &[cyclopam()]).await.expect_err("upstream");
        assert!(matches!(err, AdvisorError::Upstream(_)));
    }

    #[test]
    fn combined_text_skips_blank_fields() {
        let record = cyclopam();
        let context = AdvisorRecord::from(&record);
        insta::assert_snapshot!(context.combined_text, @"Cyclopam | Antispasmodics | stomach pain, cramps");
    }
}
