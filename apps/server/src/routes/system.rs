use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use pixhost_domain::constants::{MIB, SERVICE_NAME};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    allowed_extensions: Vec<String>,
    max_file_size: u64,
    max_file_size_mb: u64,
    has_api_keys: bool,
}

pub(super) async fn health() -> impl IntoResponse {
    let body = HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    };

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}

/// Upload policy as enforced by the store.
pub(super) async fn config(State(state): State<AppState>) -> Json<impl Serialize> {
    let policy = state.storage.policy();
    Json(ConfigResponse {
        allowed_extensions: policy.allowed_extensions(),
        max_file_size: policy.max_file_size(),
        max_file_size_mb: policy.max_file_size() / MIB,
        has_api_keys: !state.config.security.api_keys.is_empty(),
    })
}
