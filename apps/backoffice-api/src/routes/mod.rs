//! HTTP routes.
//!
//! One module per resource, each exposing a `router()` merged here:
//!
//! - [`health`] - liveness and database check
//! - [`cash_registers`] - open, close and report registers
//! - [`payments`] - record, cancel and compensate payments
//! - [`orders`] - optical orders and their lifecycle
//! - [`laboratories`] - laboratory directory
//! - [`legacy_clients`] - clients carried over with debt
//! - [`webhooks`] - Mercado Pago notifications

pub mod cash_registers;
pub mod health;
pub mod laboratories;
pub mod legacy_clients;
pub mod orders;
pub mod payments;
pub mod webhooks;

use axum::Router;

use optica_core::PageRequest;

use crate::state::AppState;

/// All routes, without middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(cash_registers::router())
        .merge(payments::router())
        .merge(orders::router())
        .merge(laboratories::router())
        .merge(legacy_clients::router())
        .merge(webhooks::router())
}

/// Page request from optional query parameters.
pub(crate) fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    let default = PageRequest::default();
    PageRequest::new(
        page.unwrap_or(default.page),
        per_page.unwrap_or(default.per_page),
    )
}
