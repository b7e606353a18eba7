//! Order routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use optica_core::{NewOrder, Order, OrderFilter, OrderPaymentStatus, OrderStatus, Page, Payment};

use super::page_request;
use crate::error::ApiResult;
use crate::gateway::Preference;
use crate::services::order_service::{AssignLaboratory, CancelOrder, UpdateOrderStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    status: Option<OrderStatus>,
    payment_status: Option<OrderPaymentStatus>,
    search: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: Option<u32>,
    per_page: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/api/orders",
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}", get(get_by_id))
            .route("/{id}/status", put(update_status))
            .route("/{id}/laboratory", put(assign_laboratory))
            .route("/{id}/cancel", post(cancel))
            .route("/{id}/payments", get(payments))
            .route("/{id}/mercadopago/preference", post(create_preference)),
    )
}

/// POST /api/orders
async fn create(
    State(state): State<AppState>,
    Json(request): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.orders().create(request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders
async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Page<Order>>> {
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
        search: query.search,
        from: query.from,
        to: query.to,
    };
    let page = page_request(query.page, query.per_page);
    Ok(Json(state.orders().list(&filter, page).await?))
}

/// GET /api/orders/{id} - with items
async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders().get(&id).await?))
}

/// PUT /api/orders/{id}/status
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateOrderStatus>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders().update_status(&id, request).await?))
}

/// PUT /api/orders/{id}/laboratory
async fn assign_laboratory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AssignLaboratory>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders().assign_laboratory(&id, request).await?))
}

/// POST /api/orders/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelOrder>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders().cancel(&id, request).await?))
}

/// GET /api/orders/{id}/payments
async fn payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Payment>>> {
    Ok(Json(state.orders().payments(&id).await?))
}

/// POST /api/orders/{id}/mercadopago/preference
async fn create_preference(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Preference>)> {
    let preference = state.gateway_service().create_preference_for_order(&id).await?;
    Ok((StatusCode::CREATED, Json(preference)))
}
