//! # Optica Back Office API
//!
//! HTTP server for the store's back office: cash registers, payments,
//! optical orders, laboratories, legacy clients and the Mercado Pago
//! integration.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back Office API                                  │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  routes (axum)          TraceLayer • CORS                        │  │
//! │  │  /api/cash-registers  /api/payments  /api/orders                 │  │
//! │  │  /api/laboratories    /api/legacy-clients  /api/webhooks         │  │
//! │  └───────────────────────────────┬──────────────────────────────────┘  │
//! │                                  │                                      │
//! │  ┌───────────────────────────────▼──────────────────────────────────┐  │
//! │  │  services                                                         │  │
//! │  │  CashRegister • Payment • Order • Laboratory • LegacyClient       │  │
//! │  │  Gateway (reconciliation) ────────► gateway::PaymentGateway       │  │
//! │  └───────────────────────────────┬───────────────────┬──────────────┘  │
//! │                                  │                   │                  │
//! │                     ┌────────────▼─────┐   ┌─────────▼──────────┐      │
//! │                     │ optica-db        │   │ Mercado Pago REST  │      │
//! │                     │ (SQLite)         │   │ (reqwest)          │      │
//! │                     └──────────────────┘   └────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (see [`config::AppConfig`]):
//! - `HTTP_PORT` - listen port (default: 8080)
//! - `DATABASE_PATH` - SQLite file (default: ./optica.db)
//! - `MERCADOPAGO_ACCESS_TOKEN` - enables the gateway
//! - `MERCADOPAGO_WEBHOOK_SECRET` - enables webhook signature checks
//! - `PUBLIC_BASE_URL` - used for the webhook `notification_url`
//! - `CORS_ALLOWED_ORIGIN` - restricts CORS to one origin

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod services;
pub mod state;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

// Re-exports
pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the application with its middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            warn!("CORS_ALLOWED_ORIGIN is not a valid header value; allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

// =============================================================================
// Router Tests
// =============================================================================
