//! # Cash Register Repository
//!
//! Database operations for till sessions.
//!
//! ## Register Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Register Lifecycle                                │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── insert_open() → status 'open'                                  │
//! │         (partial unique index: only one open row may exist)            │
//! │                                                                         │
//! │  2. BOOK PAYMENTS                                                      │
//! │     └── apply_delta() → running totals += delta                        │
//! │         (guarded: WHERE status = 'open')                               │
//! │                                                                         │
//! │  3. CLOSE                                                              │
//! │     └── close() → counted, expected, difference                        │
//! │         (guarded: WHERE status = 'open')                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::push_date_range;
use optica_core::money::Money;
use optica_core::types::{
    CashRegister, Page, PageRequest, RegisterFilter, RegisterStatus, RegisterTotals, SalesByMethod,
};

const COLUMNS: &str = "id, status, opened_by, opened_at, opening_balance_cents, \
     sales_cash_cents, sales_debit_card_cents, sales_credit_card_cents, \
     sales_bank_transfer_cents, sales_mercado_pago_cents, sales_check_cents, \
     total_sales_cents, payments_received_cents, payments_made_cents, \
     closed_by, closed_at, closing_balance_cents, expected_balance_cents, \
     difference_cents, notes";

/// Row shape of `cash_registers`.
#[derive(Debug, FromRow)]
struct CashRegisterRecord {
    id: String,
    status: RegisterStatus,
    opened_by: String,
    opened_at: DateTime<Utc>,
    opening_balance_cents: i64,
    sales_cash_cents: i64,
    sales_debit_card_cents: i64,
    sales_credit_card_cents: i64,
    sales_bank_transfer_cents: i64,
    sales_mercado_pago_cents: i64,
    sales_check_cents: i64,
    total_sales_cents: i64,
    payments_received_cents: i64,
    payments_made_cents: i64,
    closed_by: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    closing_balance_cents: Option<i64>,
    expected_balance_cents: Option<i64>,
    difference_cents: Option<i64>,
    notes: Option<String>,
}

impl From<CashRegisterRecord> for CashRegister {
    fn from(r: CashRegisterRecord) -> Self {
        CashRegister {
            id: r.id,
            status: r.status,
            opened_by: r.opened_by,
            opened_at: r.opened_at,
            opening_balance_cents: r.opening_balance_cents,
            totals: RegisterTotals {
                sales: SalesByMethod {
                    cash: Money::from_cents(r.sales_cash_cents),
                    debit_card: Money::from_cents(r.sales_debit_card_cents),
                    credit_card: Money::from_cents(r.sales_credit_card_cents),
                    bank_transfer: Money::from_cents(r.sales_bank_transfer_cents),
                    mercado_pago: Money::from_cents(r.sales_mercado_pago_cents),
                    check: Money::from_cents(r.sales_check_cents),
                },
                total_sales: Money::from_cents(r.total_sales_cents),
                payments_received: Money::from_cents(r.payments_received_cents),
                payments_made: Money::from_cents(r.payments_made_cents),
            },
            closed_by: r.closed_by,
            closed_at: r.closed_at,
            closing_balance_cents: r.closing_balance_cents,
            expected_balance_cents: r.expected_balance_cents,
            difference_cents: r.difference_cents,
            notes: r.notes,
        }
    }
}

/// Values written when a register is closed.
#[derive(Debug, Clone)]
pub struct RegisterClosing {
    pub closed_by: String,
    pub closed_at: DateTime<Utc>,
    pub closing_balance_cents: i64,
    pub expected_balance_cents: i64,
    pub difference_cents: i64,
    pub notes: Option<String>,
}

/// Repository for cash register database operations.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    /// Inserts a freshly opened register.
    ///
    /// ## Errors
    /// `DbError::Conflict` when another register is already open.
    pub async fn insert_open<'e, E>(&self, executor: E, register: &CashRegister) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %register.id, opening = register.opening_balance_cents, "Opening cash register");

        sqlx::query(
            r#"
            INSERT INTO cash_registers (id, status, opened_by, opened_at, opening_balance_cents, notes)
            VALUES (?1, 'open', ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&register.id)
        .bind(&register.opened_by)
        .bind(register.opened_at)
        .bind(register.opening_balance_cents)
        .bind(&register.notes)
        .execute(executor)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation_on("cash_registers.status") => {
                DbError::conflict("another cash register is already open")
            }
            err => err,
        })?;

        Ok(())
    }

    /// Gets a register by ID.
    pub async fn fetch<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<CashRegister>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM cash_registers WHERE id = ?1");
        let record = sqlx::query_as::<_, CashRegisterRecord>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(CashRegister::from))
    }

    /// Gets the open register, if any.
    pub async fn fetch_open<'e, E>(&self, executor: E) -> DbResult<Option<CashRegister>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM cash_registers WHERE status = 'open' LIMIT 1");
        let record = sqlx::query_as::<_, CashRegisterRecord>(&sql)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(CashRegister::from))
    }

    /// Lists registers, newest first.
    pub async fn list(
        &self,
        filter: &RegisterFilter,
        page: PageRequest,
    ) -> DbResult<Page<CashRegister>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM cash_registers WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM cash_registers WHERE 1 = 1"
        ));
        push_filters(&mut select, filter);
        select.push(" ORDER BY opened_at DESC LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let records = select
            .build_query_as::<CashRegisterRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            records.into_iter().map(CashRegister::from).collect(),
            total as u64,
            page,
        ))
    }

    /// Adds a delta to the running totals of an open register.
    ///
    /// ## Errors
    /// `DbError::Conflict` when the register is closed or missing.
    pub async fn apply_delta<'e, E>(
        &self,
        executor: E,
        id: &str,
        delta: &RegisterTotals,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(register_id = %id, total_sales = %delta.total_sales, "Applying register delta");

        let result = sqlx::query(
            r#"
            UPDATE cash_registers SET
                sales_cash_cents          = sales_cash_cents + ?1,
                sales_debit_card_cents    = sales_debit_card_cents + ?2,
                sales_credit_card_cents   = sales_credit_card_cents + ?3,
                sales_bank_transfer_cents = sales_bank_transfer_cents + ?4,
                sales_mercado_pago_cents  = sales_mercado_pago_cents + ?5,
                sales_check_cents         = sales_check_cents + ?6,
                total_sales_cents         = total_sales_cents + ?7,
                payments_received_cents   = payments_received_cents + ?8,
                payments_made_cents       = payments_made_cents + ?9
            WHERE id = ?10 AND status = 'open'
            "#,
        )
        .bind(delta.sales.cash.cents())
        .bind(delta.sales.debit_card.cents())
        .bind(delta.sales.credit_card.cents())
        .bind(delta.sales.bank_transfer.cents())
        .bind(delta.sales.mercado_pago.cents())
        .bind(delta.sales.check.cents())
        .bind(delta.total_sales.cents())
        .bind(delta.payments_received.cents())
        .bind(delta.payments_made.cents())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!("cash register {id} is not open")));
        }

        Ok(())
    }

    /// Closes an open register.
    pub async fn close<'e, E>(&self, executor: E, id: &str, closing: &RegisterClosing) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            register_id = %id,
            counted = closing.closing_balance_cents,
            expected = closing.expected_balance_cents,
            "Closing cash register"
        );

        let result = sqlx::query(
            r#"
            UPDATE cash_registers SET
                status                 = 'closed',
                closed_by              = ?1,
                closed_at              = ?2,
                closing_balance_cents  = ?3,
                expected_balance_cents = ?4,
                difference_cents       = ?5,
                notes                  = COALESCE(?6, notes)
            WHERE id = ?7 AND status = 'open'
            "#,
        )
        .bind(&closing.closed_by)
        .bind(closing.closed_at)
        .bind(closing.closing_balance_cents)
        .bind(closing.expected_balance_cents)
        .bind(closing.difference_cents)
        .bind(&closing.notes)
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!("cash register {id} is not open")));
        }

        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &RegisterFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    push_date_range(builder, "opened_at", filter.from, filter.to);
}

// =============================================================================
// Tests
// =============================================================================
