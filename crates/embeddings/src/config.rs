use std::path::Path;

pub const DEFAULT_MODEL_PATH: &str = "models/multilingual-e5-base.onnx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionDevice {
    Cpu,
    GpuPreferred,
}

impl ExecutionDevice {
    /// `EMBEDDING_DEVICE=gpu` asks for GPU; anything else is CPU.
    pub fn from_env() -> Self {
        match std::env::var("EMBEDDING_DEVICE") {
            Ok(raw) if raw.eq_ignore_ascii_case("gpu") => Self::GpuPreferred,
            _ => Self::Cpu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub model_path: String,
    pub tokenizer_path: Option<String>,
    /// Must equal the dimension of the catalog vectors.
    pub vector_dim: usize,
    pub max_sequence_length: usize,
    /// Prepended to every query before tokenisation (e5-style models use `"query: "`).
    pub query_prefix: String,
    pub normalize: bool,
    pub execution_device: ExecutionDevice,
    pub allow_pseudo_fallback: bool,
}

impl EmbeddingConfig {
    /// Config for one model file. Without an explicit tokenizer, a
    /// `<model>.tokenizer.json` sitting next to the model is used if present.
    pub fn for_model(model_path: impl Into<String>, tokenizer_path: Option<String>) -> Self {
        let model_path = model_path.into();
        let tokenizer_path = tokenizer_path.or_else(|| {
            let sibling = Path::new(&model_path).with_extension("tokenizer.json");
            sibling.exists().then(|| sibling.display().to_string())
        });
        Self {
            model_path,
            tokenizer_path,
            vector_dim: 768,
            max_sequence_length: 128,
            query_prefix: String::new(),
            normalize: true,
            execution_device: ExecutionDevice::from_env(),
            allow_pseudo_fallback: std::env::var("MEDISEARCH_ALLOW_PSEUDO_EMBED")
                .is_ok_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::for_model(
            std::env::var("MEDISEARCH_MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string()),
            std::env::var("MEDISEARCH_TOKENIZER_PATH").ok(),
        )
    }
}
