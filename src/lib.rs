pub mod composer;
pub mod config;
pub mod crawler;
pub mod jobs;
pub mod models;
pub mod ranker;
pub mod server;
pub mod storage;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::jobs::JobManager;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub job_manager: Arc<JobManager>,
}

pub fn build_app(state: AppState) -> Router {
    // CORS layer — permissive; this service has no auth surface
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(server::routes::health))
        .route("/v1/generations", post(server::routes::create_generation))
        .route(
            "/v1/generations/:job_id",
            get(server::routes::get_generation).delete(server::routes::cancel_generation),
        )
        .route(
            "/v1/generations/:job_id/download/:file_type",
            get(server::routes::download_generation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
