use std::sync::Arc;

use common::{SearchableField, config::AppConfig};
use embeddings::{CachedQueryEncoder, EmbeddingConfig, EmbeddingEngine, QueryEncoder};

/// Per-query knobs that do not live in the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalDefaults {
    pub default_top_k: usize,
    pub fuzzy_threshold: f64,
    pub vector_threshold: f32,
    pub searchable_fields: Vec<SearchableField>,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            default_top_k: 100,
            fuzzy_threshold: 50.0,
            vector_threshold: 0.6,
            searchable_fields: SearchableField::DEFAULTS.to_vec(),
        }
    }
}

impl From<&AppConfig> for RetrievalDefaults {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_top_k: config.default_top_k,
            fuzzy_threshold: config.fuzzy_threshold,
            vector_threshold: config.vector_threshold,
            searchable_fields: config.searchable_fields.clone(),
        }
    }
}

impl RetrievalDefaults {
    /// Requested result count, falling back to the default; never zero.
    pub fn top_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_top_k).max(1)
    }
}

/// Encoder for the configured model behind the bounded encode cache.
/// `vector_dim` should come from the loaded snapshot when one is available.
pub fn query_encoder(config: &AppConfig, vector_dim: Option<usize>) -> Arc<dyn QueryEncoder> {
    let mut embedding = EmbeddingConfig::for_model(config.model_path.clone(), config.tokenizer_path.clone());
    if let Some(dim) = vector_dim {
        embedding.vector_dim = dim;
    }
    Arc::new(CachedQueryEncoder::new(
        EmbeddingEngine::new(embedding),
        config.query_cache_capacity,
    ))
}
