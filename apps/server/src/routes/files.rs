use super::{base_url, image_url};
use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use pixhost_storage::{DeleteFailure, UploadRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    filename: String,
    folder: String,
    url: String,
    size: u64,
    hash: String,
    upload_time: DateTime<Utc>,
    optimized: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    filename: String,
    folder: String,
    url: String,
    size: u64,
    hash: String,
    modified_time: DateTime<Utc>,
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    files: Vec<FileEntry>,
    total: usize,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
    path: String,
}

#[derive(Serialize)]
struct DeleteAllResponse {
    success: bool,
    deleted: usize,
    failures: Vec<DeleteFailure>,
    pruned: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MoveRequest {
    filename: String,
    #[serde(default)]
    source_folder: String,
    #[serde(default)]
    target_folder: String,
}

#[derive(Serialize)]
struct MoveResponse {
    success: bool,
    folder: String,
    filename: String,
    url: String,
}

/// `multipart/form-data` with `file` (required), `folder` and `optimize`.
pub(super) async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file = None;
    let mut folder = None;
    let mut optimize = false;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                file = Some((name, content_type, bytes));
            },
            Some("folder") => folder = Some(field.text().await?),
            Some("optimize") => optimize = field.text().await?.trim().eq_ignore_ascii_case("true"),
            _ => {},
        }
    }

    let Some((name, content_type, bytes)) = file else {
        return Err(ApiError::bad_request("No file provided"));
    };
    if name.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }

    let mut request = UploadRequest::new(bytes.to_vec(), name).optimize(optimize);
    if let Some(folder) = folder {
        request = request.folder(folder);
    }
    if let Some(content_type) = content_type {
        request = request.content_type(content_type);
    }

    let receipt = state.storage.upload(request).await?;
    let url = image_url(&base_url(&state, &headers), &receipt.location());
    info!(filename = %receipt.filename, folder = %receipt.folder, size = receipt.size, "File uploaded");

    Ok(Json(UploadResponse {
        success: true,
        url,
        size: receipt.size,
        hash: receipt.digest,
        upload_time: receipt.uploaded_at,
        optimized: receipt.optimized,
        filename: receipt.filename,
        folder: receipt.folder,
    }))
}

pub(super) async fn image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    serve(&state, "", &filename).await
}

pub(super) async fn image_in_folder(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    serve(&state, &folder, &filename).await
}

async fn serve(state: &AppState, folder: &str, filename: &str) -> Result<impl IntoResponse + use<>, ApiError> {
    let bytes = state.storage.read(folder, filename).await?;
    let mime = mime_guess::from_path(filename).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.essence_str().to_owned())], bytes))
}

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let base = base_url(&state, &headers);
    let files: Vec<FileEntry> = state
        .storage
        .list()
        .await?
        .into_iter()
        .map(|object| FileEntry {
            url: image_url(&base, &object.location()),
            filename: object.filename,
            folder: object.folder,
            size: object.size,
            hash: object.digest,
            modified_time: object.modified,
        })
        .collect();

    Ok(Json(ListResponse { success: true, total: files.len(), files }))
}

pub(super) async fn delete_one(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state.storage.delete_one(&filename).await?;
    info!(path = %path, "File deleted");
    Ok(Json(DeleteResponse { success: true, message: format!("Deleted {path}"), path }))
}

pub(super) async fn delete_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.storage.delete_all().await?;
    Ok(Json(DeleteAllResponse {
        success: report.failures.is_empty(),
        deleted: report.deleted,
        failures: report.failures,
        pruned: report.pruned,
    }))
}

pub(super) async fn move_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let location = state.storage.move_file(&body.filename, &body.source_folder, &body.target_folder).await?;
    let url = image_url(&base_url(&state, &headers), &location);
    info!(filename = %location.filename, to = %location.folder, "File moved");

    Ok(Json(MoveResponse { success: true, folder: location.folder, filename: location.filename, url }))
}
