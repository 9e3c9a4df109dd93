use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Tags every request with a correlation id, echoes it back, and logs one
/// `request_complete` line. A caller-supplied id is kept.
pub async fn trace_with_correlation(mut req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let correlation = req
        .headers()
        .get(X_CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
    if let Ok(value) = HeaderValue::from_str(&correlation) {
        req.headers_mut().insert(X_CORRELATION_ID, value);
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if let Ok(value) = HeaderValue::from_str(&correlation) {
        res.headers_mut().insert(X_CORRELATION_ID, value);
    }

    info!(
        correlation_id = correlation,
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        elapsed_ms,
        "request_complete"
    );
    res
}
