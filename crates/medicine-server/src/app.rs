use axum::middleware;
use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    admin::reload_handler,
    advise::advise_handler,
    meta::{health, metrics_handler, schemas_handler},
    search::{search_get_handler, search_post_handler},
};
use crate::middleware::trace_with_correlation;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/schemas", get(schemas_handler))
        .route("/search", get(search_get_handler).post(search_post_handler))
        .route("/advise", post(advise_handler))
        .route("/admin/reload", post(reload_handler))
        .layer(middleware::from_fn(trace_with_correlation))
        .with_state(state)
}
