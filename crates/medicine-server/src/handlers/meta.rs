use axum::{
    Json,
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
};
use common::{SchemaBundle, schema_bundle};
use serde::Serialize;

use crate::state::{AppState, LatencySummary};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub records: usize,
    pub spaces: Vec<String>,
    pub vector_dimension: Option<usize>,
    pub advisor_enabled: bool,
    pub search_latency_ms: LatencySummary,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let snapshot = state.searcher.handle().current();
    Json(HealthReport {
        status: "ok",
        records: snapshot.len(),
        spaces: state.spaces.iter().map(|s| s.name.clone()).collect(),
        vector_dimension: snapshot.vector_dimension(),
        advisor_enabled: state.advisor.is_some(),
        search_latency_ms: state.search_latency_percentiles_ms().await,
    })
}

/// Prometheus text exposition of the installed recorder.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub async fn schemas_handler() -> Json<SchemaBundle> {
    Json(schema_bundle())
}
