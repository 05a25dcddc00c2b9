use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap},
    response::Json,
};
use blob_store::PutOptions;
use futures::{StreamExt, TryStreamExt};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    http_objects::{ApiError, UploadResponse},
    routes::{sanitize_filename, RouteState},
};

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// File contents.
    #[schema(format = "binary")]
    file: String,
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Accept a multipart upload and stream the `file` field into blob storage.
///
/// The declared request size is checked against the cap before any field is
/// read, so oversize uploads are refused without touching the backend.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    request_body(content_type = "multipart/form-data", content = inline(UploadForm)),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file field, empty filename, or file too large"),
        (status = 500, description = "Blob storage failure"),
    ),
)]
pub async fn upload_file(
    State(route_state): State<RouteState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_upload_bytes = route_state.config.max_upload_bytes;
    if let Some(declared) = content_length(&headers) {
        if declared > max_upload_bytes {
            return Err(ApiError::bad_request(format!(
                "file too large: request of {} bytes exceeds the {} byte limit",
                declared, max_upload_bytes
            )));
        }
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {}", err)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let raw_name = field.file_name().unwrap_or("").to_string();
        let filename = sanitize_filename(&raw_name);
        if filename.is_empty() {
            return Err(ApiError::bad_request("filename must not be empty"));
        }
        let content_type = field
            .content_type()
            .filter(|ct| !ct.is_empty())
            .unwrap_or("application/octet-stream")
            .to_string();

        let opts = PutOptions {
            content_type: Some(content_type),
            metadata: vec![
                ("original-name".to_string(), raw_name),
                ("uploaded-by".to_string(), user_agent),
            ],
        };
        let data = field.map_err(|err| anyhow::anyhow!(err)).boxed();
        let put_result = route_state
            .blob_store
            .put(&filename, data, opts)
            .await
            .map_err(|err| {
                error!(filename = %filename, "failed to store file: {:?}", err);
                ApiError::internal_error("failed to store file")
            })?;

        info!(
            filename = %filename,
            size_bytes = put_result.size_bytes,
            sha256 = %put_result.sha256_hash,
            "file uploaded"
        );
        return Ok(Json(UploadResponse {
            message: "file uploaded and overwritten successfully".to_string(),
            filename,
            overwrote: true,
        }));
    }

    Err(ApiError::bad_request("missing 'file' field in multipart body"))
}
