//! # optica-core: Pure Business Logic for the Optica Back Office
//!
//! This crate holds the payment, register and order rules of the back
//! office as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Optica Back Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 HTTP handlers (backoffice-api)                  │   │
//! │  │   /api/cash-registers  /api/payments  /api/orders  webhooks     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 Services (backoffice-api)                       │   │
//! │  │   CashRegisterService, PaymentService, GatewayService, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ optica-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │   money   │  │  payment_* │  │validation│  │   │
//! │  │   │  Order    │  │   Money   │  │ calculation│  │  rules   │  │   │
//! │  │   │  Payment  │  │   Rate    │  │ status     │  │  checks  │  │   │
//! │  │   │  Register │  │           │  │ validation │  │          │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    optica-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Payment, CashRegister, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input validation
//! - [`payment_calculation`] - Register deltas, totals, installments, summaries
//! - [`payment_status`] - Status state machines and gateway status mapping
//! - [`payment_validation`] - Business preconditions for payments
//!
//! ## Example Usage
//!
//! ```rust
//! use optica_core::money::{Money, Rate};
//! use optica_core::payment_calculation::installment_plan;
//!
//! // 6 installments with 15% financing on $1200.00
//! let plan = installment_plan(Money::from_cents(120_000), 6, Rate::from_bps(1500)).unwrap();
//! assert_eq!(plan.financed_total_cents, 138_000);
//! assert_eq!(plan.installment_cents, 23_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod payment_calculation;
pub mod payment_status;
pub mod payment_validation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use payment_status::GatewayStatus;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single order line.
///
/// Prevents typing 1000 instead of 10 on a lens pair.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest unit price accepted on an order line ($1,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Highest single amount the back office handles: payments, order totals,
/// balances and debts ($100,000,000.00).
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

/// Maximum number of lines on one order.
pub const MAX_ORDER_ITEMS: usize = 50;

/// Credit card plans offered by the card issuers.
pub const MAX_INSTALLMENTS: u32 = 24;

/// 100% in basis points.
pub const MAX_RATE_BPS: u32 = 10_000;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page a client may request.
pub const MAX_PER_PAGE: u32 = 100;
