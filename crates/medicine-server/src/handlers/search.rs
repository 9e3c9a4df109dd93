use std::{sync::Arc, time::Instant};

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{ErrorBody, SearchFilters, SearchRequest, SearchResponse};
use search_core::SearchRoute;
use serde::Deserialize;

use crate::state::AppState;

/// Query-string shape of `GET /search`; filters sit at the top level.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub category: Option<String>,
    #[serde(alias = "form_filter")]
    pub form: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_quantity: Option<u64>,
    pub max_quantity: Option<u64>,
    pub top_k: Option<usize>,
}

impl From<SearchParams> for SearchRequest {
    fn from(params: SearchParams) -> Self {
        Self {
            query: params.query,
            filters: SearchFilters {
                category: params.category,
                form: params.form,
                min_price: params.min_price,
                max_price: params.max_price,
                min_quantity: params.min_quantity,
                max_quantity: params.max_quantity,
            },
            top_k: params.top_k,
        }
    }
}

pub async fn search_get_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    run_search(state, params.into()).await
}

pub async fn search_post_handler(State(state): State<AppState>, Json(request): Json<SearchRequest>) -> Response {
    run_search(state, request).await
}

async fn run_search(state: AppState, request: SearchRequest) -> Response {
    metrics::counter!("medisearch_requests_total", "endpoint" => "search").increment(1);
    let started = Instant::now();
    let searcher = Arc::clone(&state.searcher);
    let outcome = match tokio::task::spawn_blocking(move || searcher.search(&request)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(err.to_string()))).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "search worker failed, returning no results");
            metrics::counter!("medisearch_search_failures_total").increment(1);
            return Json(SearchResponse::default()).into_response();
        }
    };

    let elapsed = started.elapsed();
    metrics::histogram!("medisearch_search_latency_ms").record(elapsed.as_secs_f64() * 1000.0);
    if outcome.route == SearchRoute::FastPath {
        metrics::counter!("medisearch_fast_path_total").increment(1);
    }
    for space in outcome.degraded_spaces {
        metrics::counter!("medisearch_space_failures_total", "space" => space).increment(1);
    }
    state.record_search_latency_ms(elapsed.as_millis()).await;
    Json(outcome.response).into_response()
}
