//! Endpoints HTTP du service
//!
//! - `GET /` : bannière texte (liveness)
//! - `GET /api` : snapshot JSON servi par le cache
//!
//! En cas d'échec, `/api` répond 500 avec un message fixe ; la cause détaillée
//! part uniquement dans les logs.

use crate::cache::SnapshotCache;
use crate::context::RequestContext;
use crate::error::SpotifyError;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Body of `GET /`
pub const BANNER: &str = "PMOSpotify is up: listening history served on /api 🎶";

/// Body of every failed `GET /api`
pub const ERROR_BODY: &str = "Error retrieving data";

/// État partagé pour les handlers Spotify
#[derive(Clone)]
pub struct SpotifyState {
    pub cache: Arc<SnapshotCache>,
    /// Deadline of each `/api` request
    pub request_timeout: Duration,
    /// Cancels every in-flight `/api` request when the server stops
    pub shutdown: CancellationToken,
}

impl SpotifyState {
    pub fn new(
        cache: Arc<SnapshotCache>,
        request_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cache,
            request_timeout,
            shutdown,
        }
    }
}

// ============ Gestion des erreurs ============

struct AppError(SpotifyError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(
            timeout = self.0.is_context_error(),
            auth = self.0.is_auth_error(),
            transient = self.0.is_transient(),
            "GET /api failed: {}",
            self.0
        );

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            ERROR_BODY,
        )
            .into_response()
    }
}

impl From<SpotifyError> for AppError {
    fn from(err: SpotifyError) -> Self {
        Self(err)
    }
}

/// Crée le router du service
pub fn create_router(state: SpotifyState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/api", get(get_snapshot))
        .with_state(state)
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn banner() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], BANNER)
}

async fn get_snapshot(State(state): State<SpotifyState>) -> Result<Response, AppError> {
    let ctx = RequestContext::with_shutdown(state.request_timeout, &state.shutdown);
    let cached = state.cache.get_or_refresh(&ctx).await?;

    let cache_control = format!("public, max-age={}", cached.fresh_for.as_secs());
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        cached.bytes,
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    Ok(response)
}
