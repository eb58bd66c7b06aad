use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::Cache,
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{Engine, SnapshotLoader},
};

pub mod admin;
pub mod games;
pub mod lookups;
pub mod recommendations;

/// Shared state handed to every handler
pub struct AppState {
    pub engine: Arc<Engine>,
    pub loader: Arc<dyn SnapshotLoader>,
    pub cache: Option<Cache>,
    /// Seconds a cached recommendation page stays valid
    pub cache_ttl: u64,
}

/// Builds the router with all routes and the middleware stack
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/games", get(games::list_games))
        .route("/games/:id", get(games::get_game))
        .route("/games/:id/recommendations", get(recommendations::similar_games))
        .route("/recommendations", post(recommendations::recommend))
        .route("/mechanics", get(lookups::mechanics))
        .route("/mechanics/by_frequency", get(lookups::mechanics_by_frequency))
        .route("/categories", get(lookups::categories))
        .route("/categories/by_frequency", get(lookups::categories_by_frequency))
        .route("/admin/reload", post(admin::reload))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    generation: u64,
    games: usize,
    embeddings: usize,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let info = state.engine.snapshot().info();
    Json(HealthResponse {
        status: "healthy",
        generation: info.generation,
        games: info.games,
        embeddings: info.embeddings,
    })
}
