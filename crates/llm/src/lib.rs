pub mod advisor;
pub mod extraction;
pub mod gemini;
pub mod prompts;

pub use advisor::{ADVISOR_NEIGHBOURS, AdvisorError, SymptomAdvisor};
pub use extraction::{AttributeExtractor, ExtractedAttributes, ExtractionOutcome, RetryPolicy};
pub use gemini::{GeminiClient, GenerationRequest, TextGenerator, strip_code_fences};
