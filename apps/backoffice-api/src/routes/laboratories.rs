//! Laboratory routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use optica_core::{Laboratory, LaboratoryFilter, LaboratoryInput, Page};

use super::page_request;
use crate::error::ApiResult;
use crate::services::laboratory_service::SetLaboratoryActive;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LaboratoryQuery {
    active: Option<bool>,
    search: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/api/laboratories",
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}", get(get_by_id).put(update).delete(delete))
            .route("/{id}/active", put(set_active)),
    )
}

/// POST /api/laboratories
async fn create(
    State(state): State<AppState>,
    Json(input): Json<LaboratoryInput>,
) -> ApiResult<(StatusCode, Json<Laboratory>)> {
    let lab = state.laboratories().create(input).await?;
    Ok((StatusCode::CREATED, Json(lab)))
}

/// GET /api/laboratories
async fn list(
    State(state): State<AppState>,
    Query(query): Query<LaboratoryQuery>,
) -> ApiResult<Json<Page<Laboratory>>> {
    let filter = LaboratoryFilter {
        active: query.active,
        search: query.search,
    };
    let page = page_request(query.page, query.per_page);
    Ok(Json(state.laboratories().list(filter, page).await?))
}

/// GET /api/laboratories/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Laboratory>> {
    Ok(Json(state.laboratories().get(&id).await?))
}

/// PUT /api/laboratories/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<LaboratoryInput>,
) -> ApiResult<Json<Laboratory>> {
    Ok(Json(state.laboratories().update(&id, input).await?))
}

/// PUT /api/laboratories/{id}/active
async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetLaboratoryActive>,
) -> ApiResult<Json<Laboratory>> {
    Ok(Json(state.laboratories().set_active(&id, request.is_active).await?))
}

/// DELETE /api/laboratories/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.laboratories().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
