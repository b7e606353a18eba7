//! Mercado Pago webhook.
//!
//! POST /api/webhooks/mercadopago receives the raw body so the signature
//! can be checked before anything is parsed.
//!
//! ```text
//! ?data.id=123&type=payment          x-signature: ts=..,v1=..
//! {"type":"payment","data":{"id":"123"}}   x-request-id: ...
//!      │
//!      ├─ not a payment event ─────────────► 200
//!      ├─ no data id / bad JSON ───────────► 400
//!      ├─ signature mismatch ──────────────► 401
//!      ▼
//! GatewayService::reconcile ──► 200 | 503 (no register) | 500
//! ```

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use crate::gateway::verify_webhook_signature;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "data.id")]
    data_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    /// Older IPN style: `?topic=payment&id=123`
    topic: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    action: Option<String>,
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    /// Numeric or string depending on the notification version.
    id: serde_json::Value,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhooks/mercadopago", post(mercadopago))
}

async fn mercadopago(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Option<WebhookBody> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(%e, "Malformed Mercado Pago webhook body");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    };

    let kind = body
        .as_ref()
        .and_then(|b| b.kind.clone())
        .or_else(|| query.kind.clone())
        .or_else(|| query.topic.clone());
    if let Some(kind) = kind.as_deref().filter(|k| *k != "payment") {
        info!(kind, "Ignoring non-payment Mercado Pago notification");
        return StatusCode::OK.into_response();
    }

    let data_id = query
        .data_id
        .clone()
        .or_else(|| body.as_ref().and_then(|b| b.data.as_ref()).and_then(|d| id_string(&d.id)))
        .or_else(|| query.id.clone())
        .filter(|id| !id.trim().is_empty());
    let Some(data_id) = data_id else {
        warn!("Mercado Pago webhook without a payment id");
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Some(secret) = state.config.mercadopago_webhook_secret.as_deref() {
        let signature = header(&headers, "x-signature");
        let request_id = header(&headers, "x-request-id");
        if let Err(e) = verify_webhook_signature(signature, request_id, &data_id, secret) {
            warn!(error = %e, data_id = %data_id, "Mercado Pago webhook signature rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    info!(
        data_id = %data_id,
        action = ?body.as_ref().and_then(|b| b.action.as_deref()),
        "Mercado Pago payment notification"
    );

    match state.gateway_service().reconcile(&data_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        // Non-2xx makes the gateway retry
        Err(e) => e.into_response(),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
