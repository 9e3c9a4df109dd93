use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::SearchableField;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpaceConfig {
    pub name: String,
    pub column: String,
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub snapshot_path: String,
    pub model_path: String,
    pub tokenizer_path: Option<String>,
    pub spaces: Vec<SpaceConfig>,
    pub searchable_fields: Vec<SearchableField>,
    pub default_top_k: usize,
    pub fuzzy_threshold: f64,
    pub vector_threshold: f32,
    pub query_cache_capacity: usize,
    pub bind_addr: String,
    pub port: u16,
    pub api_token: Option<String>,
    pub genai_api_key: Option<String>,
    pub extraction_model: String,
    pub research_model: String,
    pub extraction_max_retries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "data/medicine_snapshot.json".to_string(),
            model_path: "models/multilingual-e5-base.onnx".to_string(),
            tokenizer_path: None,
            spaces: vec![
                SpaceConfig {
                    name: "disease_symptom".to_string(),
                    column: "embedding_filter_2".to_string(),
                    k: 5,
                },
                SpaceConfig {
                    name: "form_category".to_string(),
                    column: "embedding_filter_3".to_string(),
                    k: 10,
                },
            ],
            searchable_fields: SearchableField::DEFAULTS.to_vec(),
            default_top_k: 100,
            fuzzy_threshold: 50.0,
            vector_threshold: 0.6,
            query_cache_capacity: 100,
            bind_addr: "127.0.0.1".to_string(),
            port: 38090,
            api_token: None,
            genai_api_key: None,
            extraction_model: "gemini-2.5-flash".to_string(),
            research_model: "gemini-2.0-flash".to_string(),
            extraction_max_retries: 3,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("MEDISEARCH_SNAPSHOT_PATH") {
            self.snapshot_path = path;
        }
        if let Ok(model) = std::env::var("MEDISEARCH_MODEL_PATH") {
            self.model_path = model;
        }
        if let Ok(tokenizer) = std::env::var("MEDISEARCH_TOKENIZER_PATH") {
            self.tokenizer_path = Some(tokenizer);
        }
        if let Ok(top_k) = std::env::var("MEDISEARCH_DEFAULT_TOP_K") {
            self.default_top_k = top_k.parse().unwrap_or(self.default_top_k);
        }
        if let Ok(threshold) = std::env::var("MEDISEARCH_FUZZY_THRESHOLD") {
            self.fuzzy_threshold = threshold.parse().unwrap_or(self.fuzzy_threshold);
        }
        if let Ok(threshold) = std::env::var("MEDISEARCH_VECTOR_THRESHOLD") {
            self.vector_threshold = threshold.parse().unwrap_or(self.vector_threshold);
        }
        if let Ok(capacity) = std::env::var("MEDISEARCH_QUERY_CACHE_CAPACITY") {
            self.query_cache_capacity = capacity.parse().unwrap_or(self.query_cache_capacity);
        }
        if let Ok(addr) = std::env::var("MEDISEARCH_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(port) = std::env::var("MEDISEARCH_PORT") {
            self.port = port.parse().unwrap_or(self.port);
        }
        if let Ok(token) = std::env::var("MEDISEARCH_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Ok(key) = std::env::var("GENAI_API_KEY") {
            self.genai_api_key = Some(key);
        }
    }

    pub fn space_columns(&self) -> Vec<String> {
        self.spaces.iter().map(|s| s.column.clone()).collect()
    }
}
