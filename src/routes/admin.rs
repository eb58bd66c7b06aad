use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::{error::AppResult, middleware::RequestId, routes::AppState, services::SnapshotInfo};

/// `POST /admin/reload`: rebuild the snapshot from the loader and swap it in
///
/// The previous generation keeps serving if the rebuild fails.
pub async fn reload(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<SnapshotInfo>> {
    tracing::info!(request_id = %request_id, "Snapshot reload requested");

    let info = state.engine.reload(state.loader.as_ref()).await?;

    tracing::info!(
        request_id = %request_id,
        generation = info.generation,
        games = info.games,
        embeddings = info.embeddings,
        "Snapshot reloaded"
    );

    Ok(Json(info))
}
