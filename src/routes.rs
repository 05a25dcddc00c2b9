use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request, State},
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use blob_store::BlobStore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::ServerConfig,
    http_objects::{ProbeStatus, VersionResponse},
    lifecycle::Lifecycle,
};

mod download;
mod upload;

/// Extra headroom over the upload cap so multipart framing overhead never
/// trips the transport limit before the handler's own size check runs.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz,
        readyz,
        version,
        upload::upload_file,
        download::download_file,
    ),
    info(
        title = "Blobgate Server",
        description = "HTTP gateway for uploading and downloading files backed by blob storage"
    )
)]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub config: Arc<ServerConfig>,
    pub blob_store: Arc<dyn BlobStore>,
    pub lifecycle: Arc<Lifecycle>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let body_limit = route_state.config.max_upload_bytes as usize + BODY_LIMIT_SLACK;
    Router::new()
        .merge(SwaggerUi::new("/docs/swagger").url("/docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/version", get(version))
        .route("/upload", post(upload::upload_file))
        .route("/download/{filename}", get(download::download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                let method = req.method();
                let uri = req.uri();
                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str);
                tracing::debug_span!("request", %method, %uri, matched_path)
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_origin(tower_http::cors::Any),
        )
        .with_state(route_state)
}

async fn index() -> &'static str {
    "Blobgate Server"
}

/// Liveness probe. Answers 200 for the whole process lifetime; only a hung
/// or dead process fails it.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "operations",
    responses(
        (status = 200, description = "Server is alive", body = ProbeStatus),
    ),
)]
async fn healthz() -> Json<ProbeStatus> {
    Json(ProbeStatus {
        status: "ok".to_string(),
    })
}

/// Readiness probe. 200 only while the server accepts new work; flips to
/// 503 the moment draining starts so load balancers stop routing here.
#[utoipa::path(
    get,
    path = "/readyz",
    tag = "operations",
    responses(
        (status = 200, description = "Server is accepting requests", body = ProbeStatus),
        (status = 503, description = "Server is starting or draining", body = ProbeStatus),
    ),
)]
async fn readyz(State(route_state): State<RouteState>) -> (StatusCode, Json<ProbeStatus>) {
    if route_state.lifecycle.is_ready() {
        (
            StatusCode::OK,
            Json(ProbeStatus {
                status: "ok".to_string(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeStatus {
                status: route_state.lifecycle.phase().as_str().to_string(),
            }),
        )
    }
}

#[utoipa::path(
    get,
    path = "/version",
    tag = "operations",
    responses(
        (status = 200, description = "Build version information", body = VersionResponse),
    ),
)]
async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown").to_string(),
    })
}

/// Reduce a client-supplied filename to a safe blob key: strip any
/// directory components (either separator style) and replace spaces with
/// underscores. Returns an empty string for names with no usable basename.
pub(crate) fn sanitize_filename(raw: &str) -> String {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    let basename = trimmed.rsplit(['/', '\\']).next().unwrap_or("");
    basename.replace(' ', "_")
}
