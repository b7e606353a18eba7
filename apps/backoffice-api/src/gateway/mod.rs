//! # Mercado Pago Gateway
//!
//! The outbound side of the Mercado Pago integration: creating checkout
//! preferences for an order and reading back a payment when a webhook
//! arrives. Reconciliation of those payments against local state lives in
//! [`crate::services::gateway_service`].
//!
//! ```text
//! POST /api/orders/{id}/mercadopago/preference
//!      │
//!      ▼
//! PaymentGateway::create_preference ──► POST /checkout/preferences
//!
//! POST /api/webhooks/mercadopago  (x-signature checked in signature.rs)
//!      │
//!      ▼
//! PaymentGateway::fetch_payment ──► GET /v1/payments/{id}
//!      │
//!      ▼
//! GatewayService::reconcile
//! ```
//!
//! The trait is the seam tests use to swap in an in-process fake.

pub mod mercadopago;
pub mod signature;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use optica_core::payment_status::GatewayStatus;
use optica_core::{Money, Order};

pub use mercadopago::MercadoPagoClient;
pub use signature::{verify_webhook_signature, SignatureError};

/// Errors talking to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Mercado Pago is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Mercado Pago returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Http(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A checkout preference: where the customer goes to pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
    pub sandbox_init_point: Option<String>,
    /// Amount the preference charges.
    pub amount: Money,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub id: String,
    pub status: GatewayStatus,
    /// The local order id sent as `external_reference`.
    pub external_reference: Option<String>,
    pub amount: Money,
}

/// Outbound calls to the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a checkout preference charging `amount` for `order`.
    async fn create_preference(&self, order: &Order, amount: Money) -> GatewayResult<Preference>;

    /// Reads a payment by its gateway id.
    async fn fetch_payment(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPayment>;
}

// =============================================================================
// Decimal conversion
// =============================================================================

/// Gateway decimal amount to cents, rounding half away from zero.
pub fn decimal_to_money(amount: Decimal) -> GatewayResult<Money> {
    let cents = (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("amount out of range: {amount}")))?;
    Ok(Money::from_cents(cents))
}

/// Cents to the two-decimal amount the gateway expects.
pub fn money_to_decimal(amount: Money) -> Decimal {
    Decimal::new(amount.cents(), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decimal_to_money() {
        let cases = [("1500", 150_000), ("1234.5", 123_450), ("0.015", 2), ("99.994", 9_999)];
        for (raw, cents) in cases {
            let amount = Decimal::from_str(raw).unwrap();
            assert_eq!(decimal_to_money(amount).unwrap().cents(), cents, "{raw}");
        }
    }

    #[test]
    fn test_money_to_decimal() {
        assert_eq!(money_to_decimal(Money::from_cents(123_450)).to_string(), "1234.50");
        assert_eq!(money_to_decimal(Money::from_cents(5)).to_string(), "0.05");
    }
}
