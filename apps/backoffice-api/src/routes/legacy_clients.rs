//! Legacy client routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use optica_core::{
    LegacyClient, LegacyClientFilter, LegacyClientUpdate, NewLegacyClient, Page, Payment,
};

use super::page_request;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LegacyClientQuery {
    search: Option<String>,
    with_debt: Option<bool>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/api/legacy-clients",
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}", get(get_by_id).put(update))
            .route("/{id}/payments", get(payments)),
    )
}

/// POST /api/legacy-clients
async fn create(
    State(state): State<AppState>,
    Json(request): Json<NewLegacyClient>,
) -> ApiResult<(StatusCode, Json<LegacyClient>)> {
    let client = state.legacy_clients().create(request).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /api/legacy-clients
async fn list(
    State(state): State<AppState>,
    Query(query): Query<LegacyClientQuery>,
) -> ApiResult<Json<Page<LegacyClient>>> {
    let filter = LegacyClientFilter {
        search: query.search,
        with_debt: query.with_debt,
    };
    let page = page_request(query.page, query.per_page);
    Ok(Json(state.legacy_clients().list(filter, page).await?))
}

/// GET /api/legacy-clients/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LegacyClient>> {
    Ok(Json(state.legacy_clients().get(&id).await?))
}

/// PUT /api/legacy-clients/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LegacyClientUpdate>,
) -> ApiResult<Json<LegacyClient>> {
    Ok(Json(state.legacy_clients().update(&id, request).await?))
}

/// GET /api/legacy-clients/{id}/payments
async fn payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Payment>>> {
    let page = page_request(query.page, query.per_page);
    Ok(Json(state.legacy_clients().payments(&id, page).await?))
}
