//! # Payment Status
//!
//! State machines for orders, payments and check compensation, plus the
//! mapping from Mercado Pago payment statuses to what the back office does
//! with them.
//!
//! ## Payment Status Machine
//! ```text
//!            ┌──────────► completed ───────┬──► cancelled
//!            │                             └──► rejected  (check bounced)
//!   pending ─┼──────────► cancelled
//!            └──────────► rejected
//! ```
//!
//! ## Check Compensation
//! ```text
//!   pending ──► compensated
//!      └──────► rejected
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CompensationStatus, OrderPaymentStatus, OrderStatus, PaymentStatus};

// =============================================================================
// Order Payment Status
// =============================================================================

/// Derives an order's payment status from what was paid.
///
/// A zero-total order counts as paid.
///
/// ```rust
/// use optica_core::money::Money;
/// use optica_core::payment_status::order_payment_status;
/// use optica_core::types::OrderPaymentStatus;
///
/// let total = Money::from_cents(10_000);
/// assert_eq!(order_payment_status(Money::zero(), total), OrderPaymentStatus::Pending);
/// assert_eq!(order_payment_status(Money::from_cents(4_000), total), OrderPaymentStatus::Partial);
/// assert_eq!(order_payment_status(total, total), OrderPaymentStatus::Paid);
/// ```
pub fn order_payment_status(paid: Money, total: Money) -> OrderPaymentStatus {
    if paid >= total {
        OrderPaymentStatus::Paid
    } else if paid.is_positive() {
        OrderPaymentStatus::Partial
    } else {
        OrderPaymentStatus::Pending
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// Checks a payment status change.
///
/// `completed → rejected` is accepted here; callers only take that path
/// for check payments whose compensation was rejected.
pub fn ensure_payment_transition(from: PaymentStatus, to: PaymentStatus) -> CoreResult<()> {
    use PaymentStatus::*;

    let allowed = matches!(
        (from, to),
        (Pending, Completed) | (Pending, Cancelled) | (Pending, Rejected)
            | (Completed, Cancelled)
            | (Completed, Rejected)
    );

    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidPaymentTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Checks a check compensation change: only `pending` may move, and only
/// to `compensated` or `rejected`.
pub fn ensure_compensation_transition(
    from: CompensationStatus,
    to: CompensationStatus,
) -> CoreResult<()> {
    use CompensationStatus::*;

    match (from, to) {
        (Pending, Compensated) | (Pending, Rejected) => Ok(()),
        _ => Err(CoreError::InvalidCompensationTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }),
    }
}

/// Checks an order status change.
pub fn ensure_order_transition(from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    use OrderStatus::*;

    let allowed = matches!(
        (from, to),
        (Pending, InLaboratory)
            | (Pending, Ready)
            | (Pending, Cancelled)
            | (InLaboratory, Ready)
            | (InLaboratory, Cancelled)
            | (Ready, Delivered)
            | (Ready, Cancelled)
    );

    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidOrderTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

// =============================================================================
// Gateway Status
// =============================================================================

/// A Mercado Pago payment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Approved,
    Pending,
    InProcess,
    Authorized,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    /// Anything the gateway adds later; acknowledged and ignored.
    Unknown(String),
}

impl GatewayStatus {
    /// The raw status string, as the gateway spells it.
    pub fn as_str(&self) -> &str {
        match self {
            GatewayStatus::Approved => "approved",
            GatewayStatus::Pending => "pending",
            GatewayStatus::InProcess => "in_process",
            GatewayStatus::Authorized => "authorized",
            GatewayStatus::Rejected => "rejected",
            GatewayStatus::Cancelled => "cancelled",
            GatewayStatus::Refunded => "refunded",
            GatewayStatus::ChargedBack => "charged_back",
            GatewayStatus::Unknown(raw) => raw,
        }
    }

    /// Money has not settled yet.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            GatewayStatus::Pending | GatewayStatus::InProcess | GatewayStatus::Authorized
        )
    }

    /// Money was returned to the payer after approval.
    pub fn is_reversal(&self) -> bool {
        matches!(self, GatewayStatus::Refunded | GatewayStatus::ChargedBack)
    }

    /// The local status a pending payment moves to when the gateway gives
    /// up on it.
    pub fn failure_status(&self) -> Option<PaymentStatus> {
        match self {
            GatewayStatus::Rejected => Some(PaymentStatus::Rejected),
            GatewayStatus::Cancelled => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

/// Maps a raw Mercado Pago status string.
///
/// ```rust
/// use optica_core::payment_status::{gateway_status, GatewayStatus};
///
/// assert_eq!(gateway_status("approved"), GatewayStatus::Approved);
/// assert_eq!(gateway_status("charged_back"), GatewayStatus::ChargedBack);
/// ```
pub fn gateway_status(raw: &str) -> GatewayStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "approved" => GatewayStatus::Approved,
        "pending" => GatewayStatus::Pending,
        "in_process" => GatewayStatus::InProcess,
        "authorized" => GatewayStatus::Authorized,
        "rejected" => GatewayStatus::Rejected,
        "cancelled" => GatewayStatus::Cancelled,
        "refunded" => GatewayStatus::Refunded,
        "charged_back" => GatewayStatus::ChargedBack,
        other => GatewayStatus::Unknown(other.to_string()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
