use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{FilterRequest, GameId, GameResponse, GamesPage},
    routes::AppState,
};

/// `GET /games`: filtered, sorted and paginated catalog listing
///
/// Parameters arrive as raw pairs so unknown or repeated names can be
/// rejected with the offending field named.
pub async fn list_games(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<GamesPage>> {
    let request = FilterRequest::from_query(&pairs, state.engine.limits())?;

    tracing::info!(
        request_id = %request_id,
        sort_by = ?request.sort_by,
        skip = request.page.skip,
        limit = request.page.limit,
        "Listing games"
    );

    let page = state.engine.browse(&request)?;

    tracing::info!(
        request_id = %request_id,
        total = page.total,
        returned = page.games.len(),
        "Games listed"
    );

    Ok(Json(page))
}

/// `GET /games/:id`: one game with relations and player poll resolved
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<GameId>,
) -> AppResult<Json<GameResponse>> {
    state
        .engine
        .snapshot()
        .catalog
        .resolve(game_id, true)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Game {} not found", game_id)))
}
