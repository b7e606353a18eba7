//! Health check.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use optica_db::SchemaStatus;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub schema: SchemaStatus,
    /// Whether a Mercado Pago access token is configured.
    pub mercadopago: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /health
///
/// 503 when SQLite does not answer or the schema is behind this build.
async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    if !state.db.health_check().await {
        return Err(ApiError::service_unavailable("Database is not responding"));
    }

    let schema = state.db.migration_status().await?;
    if !schema.is_current() {
        warn!(pending = ?schema.pending, "Database schema has pending migrations");
        return Err(ApiError::service_unavailable(format!(
            "Database schema is behind: {} pending migration(s)",
            schema.pending.len()
        )));
    }

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        schema,
        mercadopago: state.gateway.is_some(),
    }))
}
