use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{AdviseRequest, ErrorBody};
use llm::{ADVISOR_NEIGHBOURS, AdvisorError};

use crate::state::AppState;

pub async fn advise_handler(State(state): State<AppState>, Json(request): Json<AdviseRequest>) -> Response {
    metrics::counter!("medisearch_requests_total", "endpoint" => "advise").increment(1);
    let Some(advisor) = state.advisor.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::new("advisor disabled: GENAI_API_KEY is not configured")),
        )
            .into_response();
    };
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("query is required"))).into_response();
    }

    let searcher = Arc::clone(&state.searcher);
    let lookup = query.clone();
    let candidates = match tokio::task::spawn_blocking(move || searcher.nearest(&lookup, ADVISOR_NEIGHBOURS)).await {
        Ok(Ok(candidates)) => candidates,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "nearest-neighbour lookup failed");
            Vec::new()
        }
        Err(err) => {
            tracing::error!(error = %err, "advisor lookup worker panicked");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new("lookup failed"))).into_response();
        }
    };

    match advisor.advise(&query, &candidates).await {
        Ok(value) => Json(value).into_response(),
        Err(err @ (AdvisorError::NoCandidates | AdvisorError::InvalidResponse)) => {
            Json(ErrorBody::new(err.to_string())).into_response()
        }
        Err(err @ AdvisorError::Upstream(_)) => {
            tracing::error!(error = ?err, "advisor model call failed");
            (StatusCode::BAD_GATEWAY, Json(ErrorBody::new(err.to_string()))).into_response()
        }
    }
}
