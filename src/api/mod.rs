//! HTTP API
//!
//! Surface:
//! - `POST /api/obfuscate`: signed submission upload
//! - `GET /api/download/:filename`: artifact retrieval
//! - `GET /api/health`: liveness probe

pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::job::JobRunner;

/// State shared across handlers
pub struct AppState {
    pub config: Config,
    pub runner: JobRunner,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config) -> Self {
        let runner = JobRunner::from_config(&config.pipeline);
        Self {
            config,
            runner,
            started_at: Instant::now(),
        }
    }
}

/// Create the API router
pub fn create_router(state: SharedState) -> Router {
    let max_upload = state.config.server.max_upload_bytes;

    Router::new()
        .route("/api/obfuscate", post(routes::obfuscate))
        .route("/api/download/:filename", get(routes::download))
        .route("/api/health", get(routes::health))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
