use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Context;
use common::{
    config::{AppConfig, SpaceConfig},
    snapshot::{CatalogSource, JsonSnapshotSource},
};
use embeddings::QueryEncoder;
use llm::{GeminiClient, SymptomAdvisor};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use search_core::{CatalogHandle, HybridSearcher, RetrievalDefaults, query_encoder};
use serde::Serialize;
use tokio::sync::Mutex;

const LATENCY_WINDOW: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub metrics: PrometheusHandle,
    pub api_token: Option<String>,
    pub searcher: Arc<HybridSearcher>,
    pub source: Arc<dyn CatalogSource>,
    pub spaces: Arc<[SpaceConfig]>,
    /// `None` when no generative-AI key is configured.
    pub advisor: Option<Arc<SymptomAdvisor>>,
    pub search_latencies_ms: Arc<Mutex<VecDeque<u128>>>,
}

impl AppState {
    /// Loads the snapshot and builds every index. Any failure here is fatal
    /// for the process.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let source: Arc<dyn CatalogSource> =
            Arc::new(JsonSnapshotSource::new(&config.snapshot_path, config.space_columns()));
        let handle = CatalogHandle::load(source.as_ref(), &config.spaces)
            .with_context(|| format!("failed loading catalog from {}", source.describe()))?;
        let encoder = query_encoder(config, handle.current().vector_dimension());
        let advisor = match &config.genai_api_key {
            Some(key) => {
                let client = GeminiClient::new(key.clone())?;
                Some(Arc::new(SymptomAdvisor::new(Arc::new(client), config.extraction_model.clone())))
            }
            None => {
                tracing::info!("GENAI_API_KEY not set, /advise disabled");
                None
            }
        };
        let metrics = PrometheusBuilder::new().install_recorder()?;
        Ok(Self::assemble(config, metrics, handle, encoder, source, advisor))
    }

    /// State over an arbitrary catalog source with a detached metrics
    /// recorder and no advisor.
    pub fn for_tests(source: Arc<dyn CatalogSource>, encoder: Arc<dyn QueryEncoder>) -> anyhow::Result<Self> {
        let config = AppConfig::default();
        let handle = CatalogHandle::load(source.as_ref(), &config.spaces)?;
        let metrics = PrometheusBuilder::new().build_recorder().handle();
        Ok(Self::assemble(&config, metrics, handle, encoder, source, None))
    }

    fn assemble(
        config: &AppConfig,
        metrics: PrometheusHandle,
        handle: CatalogHandle,
        encoder: Arc<dyn QueryEncoder>,
        source: Arc<dyn CatalogSource>,
        advisor: Option<Arc<SymptomAdvisor>>,
    ) -> Self {
        let searcher = HybridSearcher::new(handle, encoder, &config.spaces, RetrievalDefaults::from(config));
        Self {
            metrics,
            api_token: config.api_token.clone(),
            searcher: Arc::new(searcher),
            source,
            spaces: config.spaces.clone().into(),
            advisor,
            search_latencies_ms: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub async fn record_search_latency_ms(&self, latency_ms: u128) {
        let mut guard = self.search_latencies_ms.lock().await;
        guard.push_back(latency_ms);
        if guard.len() > LATENCY_WINDOW {
            let _ = guard.pop_front();
        }
    }

    pub async fn search_latency_percentiles_ms(&self) -> LatencySummary {
        let guard = self.search_latencies_ms.lock().await;
        if guard.is_empty() {
            return LatencySummary::default();
        }
        let mut values = guard.iter().copied().collect::<Vec<_>>();
        values.sort_unstable();
        LatencySummary {
            p50: percentile(&values, 50),
            p95: percentile(&values, 95),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct LatencySummary {
    pub p50: u128,
    pub p95: u128,
}

/// Nearest-rank percentile over an ascending, non-empty slice.
fn percentile(sorted: &[u128], pct: usize) -> u128 {
    let idx = ((sorted.len() - 1) * pct + 50) / 100;
    sorted[idx.min(sorted.len() - 1)]
}
