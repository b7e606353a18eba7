//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │    Payment      │   │  CashRegister   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  order_number   │◄──│  order_id       │   │  status         │       │
//! │  │  status         │   │  register_id ───┼──►│  opening/closing│       │
//! │  │  payment_status │   │  kind / method  │   │  RegisterTotals │       │
//! │  │  total / paid   │   │  check? inst.?  │   │                 │       │
//! │  └───────┬─────────┘   └───────┬─────────┘   └─────────────────┘       │
//! │          │                     │                                        │
//! │  ┌───────▼─────────┐   ┌───────▼─────────┐                             │
//! │  │   Laboratory    │   │  LegacyClient   │                             │
//! │  │  external lens  │   │  debt ledger    │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persisted entities keep money as `*_cents: i64` (what the database
//! stores) with `Money` accessors; computed views (`RegisterTotals`,
//! `RegisterSummary`) use `Money` directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::MAX_AMOUNT_CENTS;

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an optics order.
///
/// ```text
/// pending ──► in_laboratory ──► ready ──► delivered
///    │              │             │
///    └──────────────┴─────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InLaboratory,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InLaboratory => "in_laboratory",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Order Payment Status
// =============================================================================

/// How much of an order has been paid. Always derived from
/// `paid_cents` and `total_cents`, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl OrderPaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "pending",
            OrderPaymentStatus::Partial => "partial",
            OrderPaymentStatus::Paid => "paid",
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order (frames, lenses, lab work).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-readable number printed on the ticket (`ORD-YYMMDD-XXXX`).
    pub order_number: String,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub client_document: Option<String>,
    pub employee_id: String,
    pub laboratory_id: Option<String>,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// `subtotal - discount`.
    pub total_cents: i64,
    /// Sum of completed payments applied to this order.
    pub paid_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Line items. Empty when loaded without items (list views).
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Amount still owed. Never negative.
    #[inline]
    pub fn balance(&self) -> Money {
        (self.total() - self.paid()).clamp_non_negative()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}

/// A line item of an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_name: String,
    /// Free text: prescription, lens treatment, frame model.
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// Input for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    pub client_name: String,
    pub client_phone: Option<String>,
    pub client_document: Option<String>,
    pub employee_id: String,
    pub laboratory_id: Option<String>,
    #[serde(default)]
    pub discount_cents: i64,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrderItem {
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewOrderItem {
    /// `unit_price × quantity`, refused when it does not fit in cents.
    pub fn line_total(&self) -> Result<Money, ValidationError> {
        Money::from_cents(self.unit_price_cents)
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| amount_overflow("items.line_total"))
    }
}

impl NewOrder {
    pub fn subtotal(&self) -> Result<Money, ValidationError> {
        self.items.iter().try_fold(Money::zero(), |subtotal, item| {
            subtotal
                .checked_add(item.line_total()?)
                .ok_or_else(|| amount_overflow("subtotal"))
        })
    }
}

fn amount_overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    }
}

// =============================================================================
// Payment Kind / Direction
// =============================================================================

/// What a payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Customer pays (part of) an order.
    OrderPayment,
    /// Legacy client pays down imported debt.
    DebtPayment,
    /// Any other money entering the till.
    Income,
    /// Store expense paid from the till.
    Expense,
    /// Cash taken out of the till (bank deposit, owner withdrawal).
    Withdrawal,
}

/// Whether money enters or leaves the till.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    Incoming,
    Outgoing,
}

impl PaymentKind {
    pub const ALL: [PaymentKind; 5] = [
        PaymentKind::OrderPayment,
        PaymentKind::DebtPayment,
        PaymentKind::Income,
        PaymentKind::Expense,
        PaymentKind::Withdrawal,
    ];

    pub const fn direction(&self) -> PaymentDirection {
        match self {
            PaymentKind::OrderPayment | PaymentKind::DebtPayment | PaymentKind::Income => {
                PaymentDirection::Incoming
            }
            PaymentKind::Expense | PaymentKind::Withdrawal => PaymentDirection::Outgoing,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::OrderPayment => "order_payment",
            PaymentKind::DebtPayment => "debt_payment",
            PaymentKind::Income => "income",
            PaymentKind::Expense => "expense",
            PaymentKind::Withdrawal => "withdrawal",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    BankTransfer,
    MercadoPago,
    Check,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::DebitCard,
        PaymentMethod::CreditCard,
        PaymentMethod::BankTransfer,
        PaymentMethod::MercadoPago,
        PaymentMethod::Check,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MercadoPago => "mercado_pago",
            PaymentMethod::Check => "check",
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// ```text
/// pending ──► completed ──► cancelled
///    │            │
///    │            └──► rejected   (bounced check only)
///    ├──► cancelled
///    └──► rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
    Rejected,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

/// Clearing state of a bank check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CompensationStatus {
    Pending,
    Compensated,
    Rejected,
}

impl CompensationStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CompensationStatus::Pending => "pending",
            CompensationStatus::Compensated => "compensated",
            CompensationStatus::Rejected => "rejected",
        }
    }
}

// =============================================================================
// Payment Sub-records
// =============================================================================

/// Bank check attached to a `check` payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckDetails {
    pub bank: String,
    pub check_number: String,
    pub issuer: Option<String>,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub compensation_status: CompensationStatus,
    #[ts(as = "Option<String>")]
    pub compensated_at: Option<DateTime<Utc>>,
}

/// Credit card installment plan. Informational: the order is credited
/// with the payment amount, the card issuer collects the financed total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentPlan {
    pub count: u32,
    pub interest_bps: u32,
    pub installment_cents: i64,
    pub financed_total_cents: i64,
}

impl InstallmentPlan {
    pub fn interest(&self) -> Rate {
        Rate::from_bps(self.interest_bps)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A single money movement through a cash register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    /// `None` only for pending gateway payments not yet booked into a till.
    pub register_id: Option<String>,
    pub kind: PaymentKind,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub order_id: Option<String>,
    pub legacy_client_id: Option<String>,
    pub employee_id: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    /// Mercado Pago payment id for gateway payments.
    pub gateway_payment_id: Option<String>,
    pub check: Option<CheckDetails>,
    pub installments: Option<InstallmentPlan>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn direction(&self) -> PaymentDirection {
        self.kind.direction()
    }

    /// Whether the payment counts towards its register's totals.
    ///
    /// Completed payments do. A bounced check does too: it physically
    /// entered the till on the day it was received.
    pub fn is_till_affecting(&self) -> bool {
        match self.status {
            PaymentStatus::Completed => true,
            PaymentStatus::Rejected => self.method == PaymentMethod::Check && self.check.is_some(),
            PaymentStatus::Pending | PaymentStatus::Cancelled => false,
        }
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub kind: PaymentKind,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub order_id: Option<String>,
    pub legacy_client_id: Option<String>,
    pub employee_id: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub check: Option<NewCheck>,
    pub installments: Option<InstallmentRequest>,
}

impl NewPayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCheck {
    pub bank: String,
    pub check_number: String,
    pub issuer: Option<String>,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentRequest {
    pub count: u32,
    #[serde(default)]
    pub interest_bps: u32,
}

// =============================================================================
// Cash Register
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RegisterStatus {
    Open,
    Closed,
}

impl RegisterStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RegisterStatus::Open => "open",
            RegisterStatus::Closed => "closed",
        }
    }
}

/// Order-payment sales per method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesByMethod {
    pub cash: Money,
    pub debit_card: Money,
    pub credit_card: Money,
    pub bank_transfer: Money,
    pub mercado_pago: Money,
    pub check: Money,
}

impl SalesByMethod {
    pub fn get(&self, method: PaymentMethod) -> Money {
        match method {
            PaymentMethod::Cash => self.cash,
            PaymentMethod::DebitCard => self.debit_card,
            PaymentMethod::CreditCard => self.credit_card,
            PaymentMethod::BankTransfer => self.bank_transfer,
            PaymentMethod::MercadoPago => self.mercado_pago,
            PaymentMethod::Check => self.check,
        }
    }

    pub fn get_mut(&mut self, method: PaymentMethod) -> &mut Money {
        match method {
            PaymentMethod::Cash => &mut self.cash,
            PaymentMethod::DebitCard => &mut self.debit_card,
            PaymentMethod::CreditCard => &mut self.credit_card,
            PaymentMethod::BankTransfer => &mut self.bank_transfer,
            PaymentMethod::MercadoPago => &mut self.mercado_pago,
            PaymentMethod::Check => &mut self.check,
        }
    }

    pub fn total(&self) -> Money {
        PaymentMethod::ALL.iter().map(|m| self.get(*m)).sum()
    }
}

/// Running totals of a register. Also used as a delta when a payment is
/// booked or reversed.
///
/// Invariant: `total_sales == sales.total()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterTotals {
    pub sales: SalesByMethod,
    pub total_sales: Money,
    /// Incoming money that is not an order sale (debt payments, income).
    pub payments_received: Money,
    /// Outgoing money (expenses, withdrawals).
    pub payments_made: Money,
}

impl RegisterTotals {
    pub fn is_zero(&self) -> bool {
        *self == RegisterTotals::default()
    }

    /// Adds another set of totals (or a delta) into this one.
    pub fn apply(&mut self, delta: &RegisterTotals) {
        for method in PaymentMethod::ALL {
            *self.sales.get_mut(method) += delta.sales.get(method);
        }
        self.total_sales += delta.total_sales;
        self.payments_received += delta.payments_received;
        self.payments_made += delta.payments_made;
    }

    /// The opposite delta, used for compensating reversals.
    pub fn negated(&self) -> RegisterTotals {
        let mut out = RegisterTotals::default();
        for method in PaymentMethod::ALL {
            *out.sales.get_mut(method) = -self.sales.get(method);
        }
        out.total_sales = -self.total_sales;
        out.payments_received = -self.payments_received;
        out.payments_made = -self.payments_made;
        out
    }
}

/// A till session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub status: RegisterStatus,
    pub opened_by: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opening_balance_cents: i64,
    pub totals: RegisterTotals,
    pub closed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Cash counted at close.
    pub closing_balance_cents: Option<i64>,
    /// Cash the till should hold at close.
    pub expected_balance_cents: Option<i64>,
    /// `closing - expected`; negative means cash is missing.
    pub difference_cents: Option<i64>,
    pub notes: Option<String>,
}

impl CashRegister {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == RegisterStatus::Open
    }

    #[inline]
    pub fn opening_balance(&self) -> Money {
        Money::from_cents(self.opening_balance_cents)
    }
}

/// Per-kind breakdown of a register's till-affecting payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct KindTotal {
    pub kind: PaymentKind,
    pub count: u32,
    pub amount: Money,
}

/// Report for one register: what the running totals say, what the payments
/// say, and whether they agree.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterSummary {
    pub register_id: String,
    pub status: RegisterStatus,
    pub opening_balance: Money,
    pub running_totals: RegisterTotals,
    pub recomputed_totals: RegisterTotals,
    pub by_kind: Vec<KindTotal>,
    pub payment_count: u32,
    pub cancelled_count: u32,
    pub expected_cash: Money,
    /// Human-readable discrepancy lines; empty when the totals reconcile.
    pub discrepancies: Vec<String>,
}

impl RegisterSummary {
    pub fn is_reconciled(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

// =============================================================================
// Laboratory
// =============================================================================

/// External lens laboratory that orders are sent to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Laboratory {
    pub id: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a laboratory's data.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LaboratoryInput {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Legacy Client
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LegacyClientStatus {
    WithDebt,
    Settled,
}

/// A customer imported from the previous system, tracked by debt only.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LegacyClient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub document_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub initial_debt_cents: i64,
    pub current_debt_cents: i64,
    #[ts(as = "Option<String>")]
    pub last_payment_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl LegacyClient {
    #[inline]
    pub fn current_debt(&self) -> Money {
        Money::from_cents(self.current_debt_cents)
    }

    pub fn status(&self) -> LegacyClientStatus {
        if self.current_debt_cents > 0 {
            LegacyClientStatus::WithDebt
        } else {
            LegacyClientStatus::Settled
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLegacyClient {
    pub first_name: String,
    pub last_name: String,
    pub document_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub initial_debt_cents: i64,
    pub notes: Option<String>,
}

/// Contact data that may change after import. Debt only changes through
/// payments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LegacyClientUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Filters
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<OrderPaymentStatus>,
    /// Matches order number, client name or client document.
    pub search: Option<String>,
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentFilter {
    pub register_id: Option<String>,
    pub order_id: Option<String>,
    pub legacy_client_id: Option<String>,
    pub kind: Option<PaymentKind>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterFilter {
    pub status: Option<RegisterStatus>,
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LaboratoryFilter {
    pub active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LegacyClientFilter {
    /// Matches name or document number.
    pub search: Option<String>,
    pub with_debt: Option<bool>,
}

// =============================================================================
// Pagination
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRequest {
    #[serde(default = "PageRequest::default_page")]
    pub page: u32,
    #[serde(default = "PageRequest::default_per_page")]
    pub per_page: u32,
}

impl PageRequest {
    fn default_page() -> u32 {
        1
    }

    fn default_per_page() -> u32 {
        crate::DEFAULT_PER_PAGE
    }

    pub fn new(page: u32, per_page: u32) -> Self {
        PageRequest { page, per_page }
    }

    /// Row offset for SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: Self::default_page(),
            per_page: Self::default_per_page(),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let per_page = request.per_page.max(1) as u64;
        let total_pages = total.div_ceil(per_page) as u32;
        Page {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
