use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{EntityCount, Page, Relation},
    routes::AppState,
    services::ranking::paginate,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupParams {
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

fn by_name(
    state: &AppState,
    relation: Relation,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> AppResult<Json<Vec<EntityCount>>> {
    let Query(params) = params.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let limits = state.engine.limits();
    let page = Page::new(
        params.skip,
        Some(params.limit.unwrap_or(limits.max_page_size)),
        limits,
    )?;

    let entities = state.engine.snapshot().catalog.entities(relation);
    Ok(Json(paginate(entities, page)))
}

fn by_frequency(state: &AppState, relation: Relation) -> Json<Vec<EntityCount>> {
    Json(state.engine.snapshot().catalog.entities_by_frequency(relation))
}

/// `GET /mechanics`, sorted by name
pub async fn mechanics(
    State(state): State<Arc<AppState>>,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> AppResult<Json<Vec<EntityCount>>> {
    by_name(&state, Relation::Mechanic, params)
}

/// `GET /categories`, sorted by name
pub async fn categories(
    State(state): State<Arc<AppState>>,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> AppResult<Json<Vec<EntityCount>>> {
    by_name(&state, Relation::Category, params)
}

pub async fn mechanics_by_frequency(State(state): State<Arc<AppState>>) -> Json<Vec<EntityCount>> {
    by_frequency(&state, Relation::Mechanic)
}

pub async fn categories_by_frequency(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<EntityCount>> {
    by_frequency(&state, Relation::Category)
}
