//! Mercado Pago REST client.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use optica_core::payment_status::gateway_status;
use optica_core::{Money, Order};

use super::{
    decimal_to_money, money_to_decimal, GatewayError, GatewayPayment, GatewayResult,
    PaymentGateway, Preference,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Mercado Pago API, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct MercadoPagoClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
    notification_url: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(
        api_url: impl Into<String>,
        access_token: impl Into<String>,
        notification_url: Option<String>,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(MercadoPagoClient {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            notification_url,
        })
    }

    async fn check(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    /// Numeric in practice; accepted either way.
    id: serde_json::Value,
    status: String,
    external_reference: Option<String>,
    transaction_amount: Decimal,
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_preference(&self, order: &Order, amount: Money) -> GatewayResult<Preference> {
        let unit_price = money_to_decimal(amount)
            .to_f64()
            .ok_or_else(|| GatewayError::InvalidResponse(format!("amount out of range: {amount}")))?;

        let mut body = json!({
            "items": [{
                "id": order.id,
                "title": format!("Orden {}", order.order_number),
                "quantity": 1,
                "currency_id": "ARS",
                "unit_price": unit_price,
            }],
            "external_reference": order.id,
        });
        if let Some(url) = &self.notification_url {
            body["notification_url"] = json!(url);
        }

        debug!(order_id = %order.id, amount = %amount, "Creating Mercado Pago preference");

        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.api_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let created: PreferenceResponse = Self::check(response).await?.json().await?;

        info!(order_id = %order.id, preference_id = %created.id, "Mercado Pago preference created");

        Ok(Preference {
            id: created.id,
            init_point: created.init_point,
            sandbox_init_point: created.sandbox_init_point,
            amount,
        })
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPayment> {
        debug!(gateway_payment_id, "Fetching Mercado Pago payment");

        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.api_url, gateway_payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let payment: PaymentResponse = Self::check(response).await?.json().await?;

        let id = match payment.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(GatewayError::InvalidResponse(format!("payment id: {other}")));
            }
        };

        Ok(GatewayPayment {
            id,
            status: gateway_status(&payment.status),
            external_reference: payment.external_reference.filter(|r| !r.is_empty()),
            amount: decimal_to_money(payment.transaction_amount)?,
        })
    }
}
