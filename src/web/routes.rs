//! Web API router construction.

use axum::{Router, routing::get};
use std::time::Duration;

use crate::state::AppState;
use crate::web::middleware::rate_limit::{RateLimitLayer, SharedRateLimitState};
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{chapters, status};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

/// Creates the web server router.
///
/// Admission control wraps the chapter routes only; the root greeting and the
/// health probe stay unmetered so orchestrators can poll them freely.
pub fn create_router(app_state: AppState, rate_limit: SharedRateLimitState) -> Router {
    let api_router = Router::new()
        .route(
            "/chapters",
            get(chapters::list_chapters).post(chapters::create_chapter),
        )
        .route("/chapters/{id}", get(chapters::get_chapter))
        .layer(RateLimitLayer::new(rate_limit))
        .route("/health", get(status::health))
        .with_state(app_state);

    let router = Router::new()
        .route("/", get(status::root))
        .nest("/api/v1", api_router);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(30)),
    ))
}
