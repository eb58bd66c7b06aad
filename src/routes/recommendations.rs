use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    cached,
    db::CacheKey,
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{GameId, GamesPage, Page, PreferenceSet},
    routes::AppState,
    services::RecommendationQuery,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub liked_games: Vec<GameId>,
    #[serde(default)]
    pub disliked_games: Vec<GameId>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    #[serde(default)]
    pub pax_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimilarParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub pax_only: bool,
}

/// `POST /recommendations`: rank the whole catalog against liked and disliked games
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<RecommendationRequest>, JsonRejection>,
) -> AppResult<Json<GamesPage>> {
    let Json(request) = body.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let limits = state.engine.limits();

    let query = RecommendationQuery {
        preferences: PreferenceSet::new(request.liked_games, request.disliked_games),
        pax_only: request.pax_only,
        page: Page::new(
            request.skip.unwrap_or(0),
            Some(request.limit.unwrap_or(limits.recommendation_limit)),
            limits,
        )?,
    };

    tracing::info!(
        request_id = %request_id,
        liked = query.preferences.liked().len(),
        disliked = query.preferences.disliked().len(),
        pax_only = query.pax_only,
        "Processing recommendation request"
    );

    let key = CacheKey::Recommendations {
        generation: state.engine.snapshot().generation,
        fingerprint: query.preferences.fingerprint(),
        pax_only: query.pax_only,
        skip: query.page.skip,
        limit: query.page.limit,
    };
    let page: GamesPage = cached!(state.cache, key, state.cache_ttl, {
        state.engine.recommend(&query)
    })?;

    Ok(Json(page))
}

/// `GET /games/:id/recommendations`: games similar to one liked game
pub async fn similar_games(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(game_id): Path<GameId>,
    params: Result<Query<SimilarParams>, QueryRejection>,
) -> AppResult<Json<GamesPage>> {
    let Query(params) = params.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(state.engine.limits().recommendation_limit);

    tracing::info!(
        request_id = %request_id,
        game_id,
        limit,
        pax_only = params.pax_only,
        "Finding similar games"
    );

    let key = CacheKey::Similar {
        generation: state.engine.snapshot().generation,
        game_id,
        pax_only: params.pax_only,
        limit,
    };
    let page: GamesPage = cached!(state.cache, key, state.cache_ttl, {
        state.engine.similar_to(game_id, limit, params.pax_only)
    })?;

    Ok(Json(page))
}
