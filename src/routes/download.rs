use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use tracing::warn;

use crate::{
    http_objects::ApiError,
    routes::{sanitize_filename, RouteState},
};

/// Stream a stored blob back to the client.
///
/// Every backend failure maps to the same 404 body, so the endpoint never
/// reveals whether a key exists, is inaccessible, or the store is down.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "files",
    params(("filename" = String, Path, description = "Name of the file to download")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "File not found"),
    ),
)]
pub async fn download_file(
    State(route_state): State<RouteState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = sanitize_filename(&filename);
    if key.is_empty() {
        return Err(ApiError::not_found("File not found"));
    }
    let blob = route_state.blob_store.get(&key).await.map_err(|err| {
        warn!(filename = %key, "download failed: {:?}", err);
        ApiError::not_found("File not found")
    })?;

    let mut headers = HeaderMap::new();
    let content_type = blob
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", key)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(size) = blob.size_bytes {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    }

    Ok((headers, Body::from_stream(blob.stream)))
}
