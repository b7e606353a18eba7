//! Payment routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use optica_core::{
    NewPayment, Page, Payment, PaymentFilter, PaymentKind, PaymentMethod, PaymentStatus,
};

use super::page_request;
use crate::error::ApiResult;
use crate::services::gateway_service::ReconcileOutcome;
use crate::services::payment_service::{CancelPayment, UpdateCheckStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    register_id: Option<String>,
    order_id: Option<String>,
    legacy_client_id: Option<String>,
    kind: Option<PaymentKind>,
    method: Option<PaymentMethod>,
    status: Option<PaymentStatus>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: Option<u32>,
    per_page: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/api/payments",
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}", get(get_by_id))
            .route("/{id}/cancel", post(cancel))
            .route("/{id}/check-status", put(update_check_status))
            .route("/mercadopago/{gateway_id}/sync", post(sync_mercadopago)),
    )
}

/// POST /api/payments
async fn create(
    State(state): State<AppState>,
    Json(request): Json<NewPayment>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let payment = state.payments().create(request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/payments
async fn list(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<Json<Page<Payment>>> {
    let filter = PaymentFilter {
        register_id: query.register_id,
        order_id: query.order_id,
        legacy_client_id: query.legacy_client_id,
        kind: query.kind,
        method: query.method,
        status: query.status,
        from: query.from,
        to: query.to,
    };
    let page = page_request(query.page, query.per_page);
    Ok(Json(state.payments().list(&filter, page).await?))
}

/// GET /api/payments/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.payments().get(&id).await?))
}

/// POST /api/payments/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelPayment>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.payments().cancel(&id, request).await?))
}

/// PUT /api/payments/{id}/check-status
async fn update_check_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCheckStatus>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.payments().update_check_status(&id, request).await?))
}

/// POST /api/payments/mercadopago/{gateway_id}/sync - manual reconciliation
async fn sync_mercadopago(
    State(state): State<AppState>,
    Path(gateway_id): Path<String>,
) -> ApiResult<Json<ReconcileOutcome>> {
    Ok(Json(state.gateway_service().reconcile(&gateway_id).await?))
}
