use super::base_url;
use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use pixhost_domain::constants::BACKUP_ROUTE;
use pixhost_storage::SnapshotInfo;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEntry {
    id: String,
    size: u64,
    created_at: DateTime<Utc>,
    url: String,
}

impl SnapshotEntry {
    fn new(info: SnapshotInfo, base: &str) -> Self {
        Self {
            url: format!("{base}{BACKUP_ROUTE}/{}", info.reference),
            id: info.id,
            size: info.size,
            created_at: info.created_at,
        }
    }
}

#[derive(Serialize)]
struct CreateResponse {
    success: bool,
    #[serde(flatten)]
    snapshot: SnapshotEntry,
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    backups: Vec<SnapshotEntry>,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestoreQuery {
    #[serde(default)]
    clear: bool,
}

#[derive(Serialize)]
struct RestoreResponse {
    success: bool,
    restored: usize,
    cleared: bool,
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let info = state.storage.create_snapshot().await?;
    let snapshot = SnapshotEntry::new(info, &base_url(&state, &headers));
    Ok(Json(CreateResponse { success: true, snapshot }))
}

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let base = base_url(&state, &headers);
    let backups: Vec<SnapshotEntry> = state
        .storage
        .list_snapshots()
        .await?
        .into_iter()
        .map(|info| SnapshotEntry::new(info, &base))
        .collect();

    Ok(Json(ListResponse { success: true, total: backups.len(), backups }))
}

pub(super) async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.storage.read_snapshot(&id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_owned()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{id}\"")),
        ],
        bytes,
    ))
}

/// Raw request body is the archive; `?clear=true` empties the store first.
pub(super) async fn restore(
    State(state): State<AppState>,
    Query(query): Query<RestoreQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Empty archive"));
    }

    let report = state.storage.restore_snapshot(body.to_vec(), query.clear).await?;
    Ok(Json(RestoreResponse { success: true, restored: report.restored, cleared: query.clear }))
}
