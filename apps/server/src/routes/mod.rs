mod backups;
mod files;
mod system;

use crate::auth::require_api_key;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use pixhost_domain::constants::{BACKUP_ROUTE, IMAGE_ROUTE};
use pixhost_storage::Location;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Multipart framing allowance on top of the raw file size.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Builds the full application router.
///
/// Public: health and image retrieval. Everything else passes the API key
/// check first.
pub fn router(state: AppState) -> Router {
    let storage_cfg = &state.config.storage;
    let upload_limit = limit(storage_cfg.max_file_size.saturating_add(MULTIPART_OVERHEAD));
    let archive_limit = limit(storage_cfg.max_archive_size);

    let protected = Router::new()
        .route("/config", get(system::config))
        .route("/upload", post(files::upload).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/list", get(files::list))
        .route("/delete/{filename}", delete(files::delete_one))
        .route("/files", delete(files::delete_all))
        .route("/move", post(files::move_file))
        .route(BACKUP_ROUTE, post(backups::create))
        .route("/backups", get(backups::list))
        .route(&format!("{BACKUP_ROUTE}/{{id}}"), get(backups::download))
        .route("/restore", post(backups::restore).layer(DefaultBodyLimit::max(archive_limit)))
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    let public = Router::new()
        .route("/health", get(system::health))
        .route(&format!("{IMAGE_ROUTE}/{{filename}}"), get(files::image))
        .route(&format!("{IMAGE_ROUTE}/{{folder}}/{{filename}}"), get(files::image_in_folder));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors(&state.config.security.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn limit(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

fn cors(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

/// Base address for retrieval URLs: the configured public URL, else the
/// request's `Host`.
pub(crate) fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(public) = &state.config.server.public_url {
        return public.trim_end_matches('/').to_owned();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

/// `<base>/image/<folder>/<filename>`, folder segment omitted when empty.
pub(crate) fn image_url(base: &str, location: &Location) -> String {
    format!("{base}{IMAGE_ROUTE}/{}", location.relative())
}
