//! Cash register routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use optica_core::{CashRegister, Page, Payment, RegisterFilter, RegisterStatus, RegisterSummary};

use super::page_request;
use crate::error::ApiResult;
use crate::services::cash_register_service::{CloseRegister, OpenRegister};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    status: Option<RegisterStatus>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: Option<u32>,
    per_page: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/api/cash-registers",
        Router::new()
            .route("/", get(list))
            .route("/open", post(open))
            .route("/current", get(current))
            .route("/{id}", get(get_by_id))
            .route("/{id}/close", post(close))
            .route("/{id}/summary", get(summary))
            .route("/{id}/payments", get(payments)),
    )
}

/// POST /api/cash-registers/open
async fn open(
    State(state): State<AppState>,
    Json(request): Json<OpenRegister>,
) -> ApiResult<(StatusCode, Json<CashRegister>)> {
    let register = state.cash_registers().open(request).await?;
    Ok((StatusCode::CREATED, Json(register)))
}

/// GET /api/cash-registers/current - `null` when none is open
async fn current(State(state): State<AppState>) -> ApiResult<Json<Option<CashRegister>>> {
    Ok(Json(state.cash_registers().current().await?))
}

/// GET /api/cash-registers
async fn list(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
) -> ApiResult<Json<Page<CashRegister>>> {
    let filter = RegisterFilter {
        status: query.status,
        from: query.from,
        to: query.to,
    };
    let page = page_request(query.page, query.per_page);
    Ok(Json(state.cash_registers().list(&filter, page).await?))
}

/// GET /api/cash-registers/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CashRegister>> {
    Ok(Json(state.cash_registers().get(&id).await?))
}

/// POST /api/cash-registers/{id}/close
async fn close(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CloseRegister>,
) -> ApiResult<Json<CashRegister>> {
    Ok(Json(state.cash_registers().close(&id, request).await?))
}

/// GET /api/cash-registers/{id}/summary
async fn summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RegisterSummary>> {
    Ok(Json(state.cash_registers().summary(&id).await?))
}

/// GET /api/cash-registers/{id}/payments
async fn payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Payment>>> {
    Ok(Json(state.cash_registers().payments(&id).await?))
}
