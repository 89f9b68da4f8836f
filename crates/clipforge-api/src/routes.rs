//! API routes.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::handlers::{
    analyze, batch, cancel_job, cut, get_job, health, job_progress, subtitles,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/analyze", post(analyze))
        .route("/subtitles", post(subtitles))
        .route("/cut", post(cut))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/progress", get(job_progress))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/batch", post(batch))
        .route("/batch/:id/progress", get(job_progress));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .nest_service("/output", ServeDir::new(&state.worker_config.output_dir))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

/// Allow configured origins, or any origin when none are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
