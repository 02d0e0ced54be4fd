//! Web API router construction.

use axum::{Router, routing::get};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::middleware::request_id::request_id;
use crate::web::{funds, status};

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/status", get(status::status))
        .route("/fund_list", get(funds::fund_list))
        .route("/fund_info", get(funds::fund_info))
        .route("/fund_data", get(funds::fund_data))
        .with_state(app_state.clone());

    let router = Router::new()
        .route("/health", get(status::health))
        .nest("/api", api_router)
        .with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        axum::middleware::from_fn(request_id),
        CorsLayer::permissive(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}
