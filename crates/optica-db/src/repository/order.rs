//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── next_order_number() + insert() → order + items                 │
//! │                                                                         │
//! │  2. PAY                                                                │
//! │     └── apply_paid_delta() → paid_cents, payment_status                │
//! │                                                                         │
//! │  3. FULFIL                                                             │
//! │     └── assign_laboratory(), update_status()                           │
//! │         pending → in_laboratory → ready → delivered                    │
//! │                                                                         │
//! │  4. (OPTIONAL) CANCEL                                                  │
//! │     └── update_status(.., Cancelled) after payments are reversed       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{like_pattern, push_date_range};
use optica_core::money::Money;
use optica_core::payment_status::order_payment_status;
use optica_core::types::{
    Order, OrderFilter, OrderItem, OrderPaymentStatus, OrderStatus, Page, PageRequest,
};

const COLUMNS: &str = "id, order_number, client_name, client_phone, client_document, \
     employee_id, laboratory_id, status, payment_status, subtotal_cents, discount_cents, \
     total_cents, paid_cents, notes, created_at, updated_at, delivered_at, cancelled_at";

/// Row shape of `orders`.
#[derive(Debug, FromRow)]
struct OrderRecord {
    id: String,
    order_number: String,
    client_name: String,
    client_phone: Option<String>,
    client_document: Option<String>,
    employee_id: String,
    laboratory_id: Option<String>,
    status: OrderStatus,
    payment_status: OrderPaymentStatus,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    paid_cents: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Order {
            id: r.id,
            order_number: r.order_number,
            client_name: r.client_name,
            client_phone: r.client_phone,
            client_document: r.client_document,
            employee_id: r.employee_id,
            laboratory_id: r.laboratory_id,
            status: r.status,
            payment_status: r.payment_status,
            subtotal_cents: r.subtotal_cents,
            discount_cents: r.discount_cents,
            total_cents: r.total_cents,
            paid_cents: r.paid_cents,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
            delivered_at: r.delivered_at,
            cancelled_at: r.cancelled_at,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRecord {
    id: String,
    order_id: String,
    product_name: String,
    description: Option<String>,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<OrderItemRecord> for OrderItem {
    fn from(r: OrderItemRecord) -> Self {
        OrderItem {
            id: r.id,
            order_id: r.order_id,
            product_name: r.product_name,
            description: r.description,
            quantity: r.quantity,
            unit_price_cents: r.unit_price_cents,
            line_total_cents: r.line_total_cents,
        }
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Next ticket number for the day: `ORD-YYMMDD-NNNN`.
    ///
    /// Bumps the day's counter, which takes the write lock. Make it the
    /// first statement of the transaction that inserts the order: a
    /// concurrent create then waits for this one to commit or roll back.
    pub async fn next_order_number<'e, E>(&self, executor: E, at: DateTime<Utc>) -> DbResult<String>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let day = at.format("%y%m%d").to_string();
        let number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_number_sequences (day, last_number) VALUES (?1, 1)
            ON CONFLICT(day) DO UPDATE SET last_number = last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(&day)
        .fetch_one(executor)
        .await?;

        Ok(format!("ORD-{day}-{number:04}"))
    }

    /// Inserts an order and its items.
    pub async fn insert(&self, conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, items = order.items.len(), "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, client_name, client_phone, client_document,
                employee_id, laboratory_id, status, payment_status,
                subtotal_cents, discount_cents, total_cents, paid_cents,
                notes, created_at, updated_at, delivered_at, cancelled_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.client_name)
        .bind(&order.client_phone)
        .bind(&order.client_document)
        .bind(&order.employee_id)
        .bind(&order.laboratory_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.subtotal_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order.paid_cents)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .execute(&mut *conn)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, position, product_name, description,
                    quantity, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.product_name)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Gets an order header by ID (items not loaded).
    pub async fn fetch<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM orders WHERE id = ?1");
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(Order::from))
    }

    /// Gets an order with its items.
    pub async fn fetch_with_items(&self, id: &str) -> DbResult<Option<Order>> {
        let Some(mut order) = self.fetch(&self.pool, id).await? else {
            return Ok(None);
        };
        order.items = self.fetch_items(&self.pool, id).await?;
        Ok(Some(order))
    }

    /// Items of an order in entry order.
    pub async fn fetch_items<'e, E>(&self, executor: E, order_id: &str) -> DbResult<Vec<OrderItem>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let records = sqlx::query_as::<_, OrderItemRecord>(
            r#"
            SELECT id, order_id, product_name, description, quantity, unit_price_cents, line_total_cents
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(records.into_iter().map(OrderItem::from).collect())
    }

    /// Lists order headers matching a filter, newest first.
    pub async fn list(&self, filter: &OrderFilter, page: PageRequest) -> DbResult<Page<Order>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM orders WHERE 1 = 1"));
        push_filters(&mut select, filter);
        select.push(" ORDER BY created_at DESC, order_number DESC LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let records = select
            .build_query_as::<OrderRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            records.into_iter().map(Order::from).collect(),
            total as u64,
            page,
        ))
    }

    /// Moves an order from `from` to `to`, stamping `delivered_at` or
    /// `cancelled_at` when reaching those states.
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(order_id = %id, from = from.as_str(), to = to.as_str(), "Updating order status");

        let now = Utc::now();
        let delivered_at = (to == OrderStatus::Delivered).then_some(now);
        let cancelled_at = (to == OrderStatus::Cancelled).then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?1,
                delivered_at = COALESCE(?2, delivered_at),
                cancelled_at = COALESCE(?3, cancelled_at),
                updated_at = ?4
            WHERE id = ?5 AND status = ?6
            "#,
        )
        .bind(to)
        .bind(delivered_at)
        .bind(cancelled_at)
        .bind(now)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "order {id} is no longer {}",
                from.as_str()
            )));
        }

        Ok(())
    }

    /// Sets (or clears) the laboratory of an order still in progress.
    pub async fn assign_laboratory<'e, E>(
        &self,
        executor: E,
        id: &str,
        laboratory_id: Option<&str>,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(order_id = %id, laboratory_id = ?laboratory_id, "Assigning laboratory");

        let result = sqlx::query(
            r#"
            UPDATE orders SET laboratory_id = ?1, updated_at = ?2
            WHERE id = ?3 AND status NOT IN ('delivered', 'cancelled')
            "#,
        )
        .bind(laboratory_id)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "order {id} is closed or missing"
            )));
        }

        Ok(())
    }

    /// Adds `delta` to the paid amount and re-derives the payment status.
    ///
    /// Returns the updated order header.
    pub async fn apply_paid_delta(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        delta: Money,
    ) -> DbResult<Order> {
        let mut order = self
            .fetch(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        let paid = (order.paid() + delta).clamp_non_negative();
        let status = order_payment_status(paid, order.total());

        debug!(order_id = %id, delta = %delta, paid = %paid, status = status.as_str(), "Updating order paid amount");

        let now = Utc::now();
        sqlx::query(
            "UPDATE orders SET paid_cents = ?1, payment_status = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(paid.cents())
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        order.paid_cents = paid.cents();
        order.payment_status = status;
        order.updated_at = now;
        Ok(order)
    }

    /// Number of orders pointing to a laboratory.
    pub async fn count_for_laboratory<'e, E>(&self, executor: E, laboratory_id: &str) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE laboratory_id = ?1")
            .bind(laboratory_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(payment_status) = filter.payment_status {
        builder.push(" AND payment_status = ");
        builder.push_bind(payment_status.as_str());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        builder.push(" AND (order_number LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR client_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR client_document LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
    push_date_range(builder, "created_at", filter.from, filter.to);
}

// =============================================================================
// Tests
// =============================================================================
