//! HTTP JSON API.
//!
//! Thin routing layer over the refresh and enrichment pipelines.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/subjects/{handle}` | Profile view with live aggregates |
//! | `POST`   | `/subjects/{handle}/refresh` | Replace media from the provider chain |
//! | `GET`    | `/subjects/{handle}/raw` | Resolved payload, unmodified |
//! | `DELETE` | `/subjects/{handle}/videos` | Drop all videos of a subject |
//! | `POST`   | `/media/{id}/analyze` | Classify one media item |
//! | `GET`    | `/proxy-image?url=` | Relay a remote image |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid handle 'a b': ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `bad_gateway` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! Origins come from `[server].cors_origins`; local development origins are
//! added when any configured origin is on localhost.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::analyze::{analyze_media, parse_image_url, AnalysisResult, ImageFetcher};
use crate::config::Config;
use crate::error::HarnessError;
use crate::models::SubjectHandle;
use crate::refresh::{self, ProfileView, RawView, RefreshOutcome};
use crate::resolver::SourceResolver;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<SourceResolver>,
    pub store: Arc<dyn Store>,
    pub fetcher: ImageFetcher,
}

impl AppState {
    pub fn new(
        config: Config,
        resolver: SourceResolver,
        store: Arc<dyn Store>,
    ) -> anyhow::Result<Self> {
        let fetcher = ImageFetcher::new(&config.analysis)?;
        Ok(Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            store,
            fetcher,
        })
    }
}

/// Starts the HTTP server on `[server].bind` against the configured SQLite
/// database. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(config).await?);
    let resolver = SourceResolver::from_config(config)?;

    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config.clone(), resolver, store)?);

    tracing::info!(addr = %bind_addr, "server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(handle_health))
        .route("/subjects/{handle}", get(handle_show))
        .route("/subjects/{handle}/refresh", post(handle_refresh))
        .route("/subjects/{handle}/raw", get(handle_raw))
        .route("/subjects/{handle}/videos", delete(handle_clear_videos))
        .route("/media/{id}/analyze", post(handle_analyze))
        .route("/proxy-image", get(handle_proxy_image))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins()
        .into_iter()
        .filter_map(|o| match HeaderValue::from_str(&o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Contract violations map to 4xx; everything else is a 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<HarnessError>() {
            Some(e @ HarnessError::InvalidHandle { .. }) => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", e.to_string())
            }
            Some(e @ (HarnessError::SubjectNotFound(_) | HarnessError::MediaNotFound(_))) => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", e.to_string())
            }
            None => {
                tracing::error!(error = %format!("{:#}", err), "request failed");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    format!("{:#}", err),
                )
            }
        }
    }
}

impl From<HarnessError> for AppError {
    fn from(err: HarnessError) -> Self {
        anyhow::Error::from(err).into()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /subjects/{handle} ============

async fn handle_show(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<ProfileView>, AppError> {
    let handle = SubjectHandle::parse(&handle)?;
    let view = refresh::show_subject(
        &state.config,
        &state.resolver,
        state.store.as_ref(),
        &handle,
    )
    .await?;
    Ok(Json(view))
}

async fn handle_refresh(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<RefreshOutcome>, AppError> {
    let handle = SubjectHandle::parse(&handle)?;
    let outcome = refresh::run_refresh(
        &state.config,
        &state.resolver,
        state.store.as_ref(),
        &handle,
    )
    .await?;
    Ok(Json(outcome))
}

async fn handle_raw(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<RawView>, AppError> {
    let handle = SubjectHandle::parse(&handle)?;
    Ok(Json(refresh::raw_payload(&state.resolver, &handle).await))
}

#[derive(Serialize)]
struct ClearVideosResponse {
    handle: SubjectHandle,
    deleted: u64,
}

async fn handle_clear_videos(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<ClearVideosResponse>, AppError> {
    let handle = SubjectHandle::parse(&handle)?;
    let deleted = refresh::clear_videos(state.store.as_ref(), &handle).await?;
    Ok(Json(ClearVideosResponse { handle, deleted }))
}

// ============ POST /media/{id}/analyze ============

async fn handle_analyze(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = analyze_media(&state.fetcher, state.store.as_ref(), id).await?;
    Ok(Json(result))
}

// ============ GET /proxy-image ============

#[derive(Deserialize)]
struct ProxyParams {
    url: Option<String>,
}

async fn handle_proxy_image(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
) -> Result<Response, AppError> {
    let url = params
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "bad_request", "url is required"))?;
    parse_image_url(&url).map_err(|e| {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", format!("{:#}", e))
    })?;

    let image = state.fetcher.fetch(&url).await.map_err(|e| {
        AppError::new(StatusCode::BAD_GATEWAY, "bad_gateway", format!("{:#}", e))
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        image.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle_maps_to_400() {
        let err = SubjectHandle::parse("bad handle!").unwrap_err();
        let app_err = AppError::from(err);
        assert_eq!(app_err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_media_maps_to_404() {
        let app_err = AppError::from(anyhow::Error::from(HarnessError::MediaNotFound(7)));
        assert_eq!(app_err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_plumbing_errors_map_to_500() {
        let app_err = AppError::from(anyhow::anyhow!("disk full"));
        assert_eq!(app_err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
