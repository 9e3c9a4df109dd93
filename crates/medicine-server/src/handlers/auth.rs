use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use common::ErrorBody;

use crate::state::AppState;

pub const X_API_TOKEN: &str = "x-api-token";

/// Admin guard. Open when no token is configured.
pub fn require_token(headers: &HeaderMap, state: &AppState) -> Result<(), Response> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(());
    };
    let presented = headers.get(X_API_TOKEN).and_then(|h| h.to_str().ok());
    if presented == Some(expected) {
        Ok(())
    } else {
        tracing::warn!(token_present = presented.is_some(), "rejected admin request");
        Err((StatusCode::UNAUTHORIZED, Json(ErrorBody::new("unauthorized"))).into_response())
    }
}
