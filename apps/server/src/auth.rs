//! Shared-secret check applied to every mutating or listing route.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use pixhost_domain::constants::API_KEY_HEADER;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct KeyQuery {
    api_key: Option<String>,
}

/// Admits the request when no keys are configured, or when the
/// `X-API-Key` header (preferred) or `api_key` query parameter matches one.
pub(crate) async fn require_api_key(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let keys = &state.config.security.api_keys;
    if keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or(query.api_key);

    match presented {
        Some(key) if keys.iter().any(|k| k == &key) => Ok(next.run(request).await),
        Some(_) => Err(ApiError::Unauthorized { message: "Invalid API key".into(), context: None }),
        None => Err(ApiError::Unauthorized {
            message: "API key required".into(),
            context: Some(format!("Send the {API_KEY_HEADER} header").into()),
        }),
    }
}
