//! # Error Types
//!
//! Domain-specific error types for optica-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  optica-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  optica-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  HTTP errors (backoffice-api)                                          │
//! │  └── ApiError         - What the client sees (code + message)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → HTTP response          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the payment, register and order rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity referenced by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A payment was attempted while no cash register is open.
    ///
    /// ## User Workflow
    /// ```text
    /// Cashier records a payment
    ///      │
    ///      ▼
    /// CashRegisterRepository::fetch_open() → None
    ///      │
    ///      ▼
    /// NoOpenRegister → UI prompts "Open the register first"
    /// ```
    #[error("No cash register is open")]
    NoOpenRegister,

    /// A second register was opened while another one is still open.
    #[error("Cash register {register_id} is already open")]
    RegisterAlreadyOpen { register_id: String },

    /// The register was closed and can no longer change.
    #[error("Cash register {register_id} is closed")]
    RegisterClosed { register_id: String },

    /// New payments are rejected for cancelled orders.
    #[error("Order {order_id} is cancelled")]
    OrderCancelled { order_id: String },

    #[error("Order cannot move from {from} to {to}")]
    InvalidOrderTransition { from: String, to: String },

    #[error("Payment cannot move from {from} to {to}")]
    InvalidPaymentTransition { from: String, to: String },

    #[error("Check compensation cannot move from {from} to {to}")]
    InvalidCompensationTransition { from: String, to: String },

    /// Payment would take the order past its total.
    #[error("Payment of {requested} exceeds order balance of {balance}")]
    AmountExceedsBalance { balance: Money, requested: Money },

    /// Debt payment larger than what the legacy client owes.
    #[error("Payment of {requested} exceeds client debt of {debt}")]
    AmountExceedsDebt { debt: Money, requested: Money },

    #[error("Order needs an assigned laboratory")]
    LaboratoryRequired,

    #[error("Laboratory {laboratory_id} is inactive")]
    LaboratoryInactive { laboratory_id: String },

    #[error("Payment {payment_id} is not a check payment")]
    NotACheckPayment { payment_id: String },

    /// Kind/method/target combination is not allowed.
    #[error("Payment not allowed: {reason}")]
    PaymentNotAllowed { reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for an entity type and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn not_allowed(reason: impl Into<String>) -> Self {
        CoreError::PaymentNotAllowed {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
