pub mod cache;
pub mod config;
pub mod engine;

pub use cache::{CacheStats, CachedQueryEncoder, QueryEncoder};
pub use config::{DEFAULT_MODEL_PATH, EmbeddingConfig, ExecutionDevice};
pub use engine::{EmbeddingEngine, pseudo_embed};
