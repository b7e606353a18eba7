//! # Repository Module
//!
//! Database repository implementations for the back office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service                                                                │
//! │       │                                                                 │
//! │       │  db.payments().insert(&mut *tx, &payment)                       │
//! │       ▼                                                                 │
//! │  PaymentRepository                                                      │
//! │  ├── reads/writes generic over `Executor`  → pool OR open transaction  │
//! │  └── paginated lists on the pool          → COUNT + SELECT             │
//! │       │                                                                 │
//! │       │  SQL (runtime-checked, mapped through FromRow records)          │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods taking an `executor` run against whatever is passed: `db.pool()`
//! for a standalone statement, `&mut *tx` to join a transaction. Inside a
//! transaction, always pass the transaction; the pool may have a single
//! connection (in-memory tests) and would wait on itself.
//!
//! ## Available Repositories
//!
//! - [`order::OrderRepository`] - Orders and their items
//! - [`payment::PaymentRepository`] - Payments, checks, installments
//! - [`cash_register::CashRegisterRepository`] - Till sessions and totals
//! - [`laboratory::LaboratoryRepository`] - External labs
//! - [`legacy_client::LegacyClientRepository`] - Imported debt ledger

pub mod cash_register;
pub mod laboratory;
pub mod legacy_client;
pub mod order;
pub mod payment;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// First instant of a day (UTC).
pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// First instant of the following day, for half-open `[from, to + 1)` ranges.
pub(crate) fn day_after(date: NaiveDate) -> DateTime<Utc> {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    day_start(next)
}

/// Appends `AND column >= from AND column < to+1day` for the given range.
pub(crate) fn push_date_range(
    builder: &mut QueryBuilder<'_, Sqlite>,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) {
    if let Some(from) = from {
        builder.push(format!(" AND {column} >= "));
        builder.push_bind(day_start(from));
    }
    if let Some(to) = to {
        builder.push(format!(" AND {column} < "));
        builder.push_bind(day_after(to));
    }
}

/// `%term%` with LIKE wildcards escaped (use with `ESCAPE '\'`).
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
