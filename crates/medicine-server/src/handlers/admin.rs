use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use common::ErrorBody;
use serde::Serialize;

use crate::{handlers::auth::require_token, state::AppState};

#[derive(Debug, Serialize)]
pub struct ReloadReport {
    pub records: usize,
    pub source: String,
}

/// Re-reads the snapshot and swaps it in. On failure the previous snapshot
/// keeps serving.
pub async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = require_token(&headers, &state) {
        return rejection;
    }
    metrics::counter!("medisearch_requests_total", "endpoint" => "reload").increment(1);

    let searcher = Arc::clone(&state.searcher);
    let source = Arc::clone(&state.source);
    let spaces = Arc::clone(&state.spaces);
    let reloaded =
        tokio::task::spawn_blocking(move || searcher.handle().reload_from(source.as_ref(), &spaces)).await;
    match reloaded {
        Ok(Ok(records)) => Json(ReloadReport {
            records,
            source: state.source.describe(),
        })
        .into_response(),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "snapshot reload failed, keeping previous snapshot");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(err.to_string()))).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "reload worker panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new("reload failed"))).into_response()
        }
    }
}
