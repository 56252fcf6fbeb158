use super::{ErrorBody, MissingBlobsRequest, PutArtifact, PutBlob};
use crate::cache::{ArtifactCache, ArtifactInfo, BlobInfo, MissingBlobs};
use crate::error::{CacheError, ScanFailure};
use crate::model::{FailureKind, ScanResults};
use crate::scanner::{LocalScanner, ScanDriver, ScanRequest};
use axum::{
    extract::{Path, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Shared state of the scan service. Holds no per-client data.
#[derive(Clone)]
pub struct AppState {
    scanner: LocalScanner,
    cache: Arc<dyn ArtifactCache>,
    token: Option<Arc<(HeaderName, String)>>,
}

impl AppState {
    pub fn new(scanner: LocalScanner, cache: Arc<dyn ArtifactCache>) -> Self {
        Self {
            scanner,
            cache,
            token: None,
        }
    }

    /// Requires `token` in `header` on every route except `/healthz`.
    pub fn with_token(mut self, header: &str, token: impl Into<String>) -> anyhow::Result<Self> {
        let header = HeaderName::try_from(header)?;
        self.token = Some(Arc::new((header, token.into())));
        Ok(self)
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scan", post(scan))
        .route("/cache/artifact", post(put_artifact))
        .route("/cache/artifact/{key}", get(get_artifact))
        .route("/cache/blob", post(put_blob))
        .route("/cache/blob/{key}", get(get_blob))
        .route("/cache/missing", post(missing_blobs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(api)
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Scan server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Scan server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.token {
        let (header, token) = expected.as_ref();
        let presented = request.headers().get(header).and_then(|v| v.to_str().ok());
        if presented != Some(token.as_str()) {
            warn!(path = %request.uri().path(), "Rejected request with missing or invalid token");
            return ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "invalid token")
                .into_response();
        }
    }
    next.run(request).await
}

async fn scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResults>, ApiError> {
    request
        .options
        .validate()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "invalid_options", e.to_string()))?;

    debug!(target_name = %request.target, blobs = request.blob_keys.len(), "Scan request");
    let results = state.scanner.scan(&request).await?;
    Ok(Json(results))
}

async fn put_artifact(
    State(state): State<AppState>,
    Json(body): Json<PutArtifact>,
) -> Result<StatusCode, ApiError> {
    state.cache.put_artifact(&body.key, &body.info).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_blob(
    State(state): State<AppState>,
    Json(body): Json<PutBlob>,
) -> Result<StatusCode, ApiError> {
    state.cache.put_blob(&body.key, &body.info).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_artifact(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ArtifactInfo>, ApiError> {
    Ok(Json(state.cache.get_artifact(&key).await?))
}

async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<BlobInfo>, ApiError> {
    Ok(Json(state.cache.get_blob(&key).await?))
}

async fn missing_blobs(
    State(state): State<AppState>,
    Json(body): Json<MissingBlobsRequest>,
) -> Result<Json<MissingBlobs>, ApiError> {
    let missing = state
        .cache
        .missing_blobs(&body.artifact_key, &body.blob_keys)
        .await?;
    Ok(Json(missing))
}

struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
                kind: None,
            },
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        if err.is_miss() {
            ApiError::new(StatusCode::NOT_FOUND, "cache_miss", err.to_string())
        } else {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "cache_error", err.to_string())
        }
    }
}

impl From<ScanFailure> for ApiError {
    fn from(err: ScanFailure) -> Self {
        let kind = err.kind();
        let status = match kind {
            FailureKind::CacheMiss => StatusCode::NOT_FOUND,
            FailureKind::UnsupportedOs => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut error = ApiError::new(status, "scan_failed", err.to_string());
        error.body.kind = Some(kind);
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
