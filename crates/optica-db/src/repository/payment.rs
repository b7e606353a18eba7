//! # Payment Repository
//!
//! Database operations for payments, including their check and
//! installment sub-records (stored as nullable column groups).
//!
//! Status changes are guarded: every update names the status it expects
//! to find, and an update that matches no row is a `DbError::Conflict`.
//! Two cashiers cancelling the same payment cannot both succeed.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::push_date_range;
use optica_core::types::{
    CheckDetails, CompensationStatus, InstallmentPlan, Page, PageRequest, Payment, PaymentFilter,
    PaymentKind, PaymentMethod, PaymentStatus,
};

const COLUMNS: &str = "id, register_id, kind, method, status, amount_cents, order_id, \
     legacy_client_id, employee_id, reference, notes, gateway_payment_id, \
     check_bank, check_number, check_issuer, check_due_date, check_compensation_status, \
     check_compensated_at, installment_count, installment_interest_bps, installment_cents, \
     installment_financed_cents, cancel_reason, cancelled_by, cancelled_at, created_at, updated_at";

/// Row shape of `payments`.
#[derive(Debug, FromRow)]
struct PaymentRecord {
    id: String,
    register_id: Option<String>,
    kind: PaymentKind,
    method: PaymentMethod,
    status: PaymentStatus,
    amount_cents: i64,
    order_id: Option<String>,
    legacy_client_id: Option<String>,
    employee_id: String,
    reference: Option<String>,
    notes: Option<String>,
    gateway_payment_id: Option<String>,
    check_bank: Option<String>,
    check_number: Option<String>,
    check_issuer: Option<String>,
    check_due_date: Option<NaiveDate>,
    check_compensation_status: Option<CompensationStatus>,
    check_compensated_at: Option<DateTime<Utc>>,
    installment_count: Option<i64>,
    installment_interest_bps: Option<i64>,
    installment_cents: Option<i64>,
    installment_financed_cents: Option<i64>,
    cancel_reason: Option<String>,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRecord> for Payment {
    fn from(r: PaymentRecord) -> Self {
        let check = match (r.check_bank, r.check_number, r.check_due_date, r.check_compensation_status) {
            (Some(bank), Some(check_number), Some(due_date), Some(compensation_status)) => {
                Some(CheckDetails {
                    bank,
                    check_number,
                    issuer: r.check_issuer,
                    due_date,
                    compensation_status,
                    compensated_at: r.check_compensated_at,
                })
            }
            _ => None,
        };

        let installments = match (
            r.installment_count,
            r.installment_interest_bps,
            r.installment_cents,
            r.installment_financed_cents,
        ) {
            (Some(count), Some(interest_bps), Some(installment_cents), Some(financed_total_cents)) => {
                Some(InstallmentPlan {
                    count: count as u32,
                    interest_bps: interest_bps as u32,
                    installment_cents,
                    financed_total_cents,
                })
            }
            _ => None,
        };

        Payment {
            id: r.id,
            register_id: r.register_id,
            kind: r.kind,
            method: r.method,
            status: r.status,
            amount_cents: r.amount_cents,
            order_id: r.order_id,
            legacy_client_id: r.legacy_client_id,
            employee_id: r.employee_id,
            reference: r.reference,
            notes: r.notes,
            gateway_payment_id: r.gateway_payment_id,
            check,
            installments,
            cancel_reason: r.cancel_reason,
            cancelled_by: r.cancelled_by,
            cancelled_at: r.cancelled_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Inserts a payment with its sub-records.
    pub async fn insert<'e, E>(&self, executor: E, payment: &Payment) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %payment.id,
            kind = payment.kind.as_str(),
            method = payment.method.as_str(),
            amount = payment.amount_cents,
            "Inserting payment"
        );

        let check = payment.check.as_ref();
        let plan = payment.installments.as_ref();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, register_id, kind, method, status, amount_cents,
                order_id, legacy_client_id, employee_id, reference, notes, gateway_payment_id,
                check_bank, check_number, check_issuer, check_due_date,
                check_compensation_status, check_compensated_at,
                installment_count, installment_interest_bps, installment_cents, installment_financed_cents,
                cancel_reason, cancelled_by, cancelled_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16,
                ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, ?24, ?25, ?26, ?27
            )
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.register_id)
        .bind(payment.kind)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.amount_cents)
        .bind(&payment.order_id)
        .bind(&payment.legacy_client_id)
        .bind(&payment.employee_id)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(&payment.gateway_payment_id)
        .bind(check.map(|c| c.bank.clone()))
        .bind(check.map(|c| c.check_number.clone()))
        .bind(check.and_then(|c| c.issuer.clone()))
        .bind(check.map(|c| c.due_date))
        .bind(check.map(|c| c.compensation_status))
        .bind(check.and_then(|c| c.compensated_at))
        .bind(plan.map(|p| p.count as i64))
        .bind(plan.map(|p| p.interest_bps as i64))
        .bind(plan.map(|p| p.installment_cents))
        .bind(plan.map(|p| p.financed_total_cents))
        .bind(&payment.cancel_reason)
        .bind(&payment.cancelled_by)
        .bind(payment.cancelled_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Gets a payment by ID.
    pub async fn fetch<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Payment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = ?1");
        let record = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(Payment::from))
    }

    /// Gets a payment by its Mercado Pago id.
    pub async fn fetch_by_gateway_id<'e, E>(
        &self,
        executor: E,
        gateway_payment_id: &str,
    ) -> DbResult<Option<Payment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE gateway_payment_id = ?1");
        let record = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(gateway_payment_id)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(Payment::from))
    }

    /// All payments booked into a register, oldest first.
    pub async fn list_for_register<'e, E>(&self, executor: E, register_id: &str) -> DbResult<Vec<Payment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {COLUMNS} FROM payments WHERE register_id = ?1 ORDER BY created_at ASC, id ASC"
        );
        let records = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(register_id)
            .fetch_all(executor)
            .await?;

        Ok(records.into_iter().map(Payment::from).collect())
    }

    /// All payments made against an order, oldest first.
    pub async fn list_for_order<'e, E>(&self, executor: E, order_id: &str) -> DbResult<Vec<Payment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {COLUMNS} FROM payments WHERE order_id = ?1 ORDER BY created_at ASC, id ASC"
        );
        let records = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(order_id)
            .fetch_all(executor)
            .await?;

        Ok(records.into_iter().map(Payment::from).collect())
    }

    /// Lists payments matching a filter, newest first.
    pub async fn list(&self, filter: &PaymentFilter, page: PageRequest) -> DbResult<Page<Payment>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payments WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM payments WHERE 1 = 1"));
        push_filters(&mut select, filter);
        select.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let records = select
            .build_query_as::<PaymentRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            records.into_iter().map(Payment::from).collect(),
            total as u64,
            page,
        ))
    }

    /// Moves a payment from `from` to `to`.
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(payment_id = %id, from = from.as_str(), to = to.as_str(), "Updating payment status");

        let result = sqlx::query(
            "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;

        guard(result.rows_affected(), id, from)
    }

    /// Completes a pending payment inside a register.
    pub async fn mark_completed<'e, E>(&self, executor: E, id: &str, register_id: &str) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(payment_id = %id, register_id = %register_id, "Completing pending payment");

        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'completed', register_id = ?1, updated_at = ?2
            WHERE id = ?3 AND status = 'pending'
            "#,
        )
        .bind(register_id)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        guard(result.rows_affected(), id, PaymentStatus::Pending)
    }

    /// Cancels a payment, recording who and why.
    pub async fn cancel<'e, E>(
        &self,
        executor: E,
        id: &str,
        from: PaymentStatus,
        reason: &str,
        cancelled_by: &str,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(payment_id = %id, from = from.as_str(), "Cancelling payment");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'cancelled', cancel_reason = ?1, cancelled_by = ?2,
                cancelled_at = ?3, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(reason)
        .bind(cancelled_by)
        .bind(now)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;

        guard(result.rows_affected(), id, from)
    }

    /// Moves a check's compensation status.
    pub async fn update_compensation<'e, E>(
        &self,
        executor: E,
        id: &str,
        from: CompensationStatus,
        to: CompensationStatus,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(payment_id = %id, from = from.as_str(), to = to.as_str(), "Updating check compensation");

        let now = Utc::now();
        let compensated_at = (to == CompensationStatus::Compensated).then_some(now);
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                check_compensation_status = ?1, check_compensated_at = ?2, updated_at = ?3
            WHERE id = ?4 AND method = 'check' AND check_compensation_status = ?5
            "#,
        )
        .bind(to)
        .bind(compensated_at)
        .bind(now)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "check payment {id} is no longer {}",
                from.as_str()
            )));
        }

        Ok(())
    }
}

fn guard(rows_affected: u64, id: &str, expected: PaymentStatus) -> DbResult<()> {
    if rows_affected == 0 {
        return Err(DbError::conflict(format!(
            "payment {id} is no longer {}",
            expected.as_str()
        )));
    }
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PaymentFilter) {
    if let Some(register_id) = &filter.register_id {
        builder.push(" AND register_id = ");
        builder.push_bind(register_id.clone());
    }
    if let Some(order_id) = &filter.order_id {
        builder.push(" AND order_id = ");
        builder.push_bind(order_id.clone());
    }
    if let Some(client_id) = &filter.legacy_client_id {
        builder.push(" AND legacy_client_id = ");
        builder.push_bind(client_id.clone());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ");
        builder.push_bind(kind.as_str());
    }
    if let Some(method) = filter.method {
        builder.push(" AND method = ");
        builder.push_bind(method.as_str());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    push_date_range(builder, "created_at", filter.from, filter.to);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{open_register, test_db};
    use crate::Database;
    use uuid::Uuid;

    fn payment(register_id: Option<&str>, method: PaymentMethod, status: PaymentStatus) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4().to_string(),
            register_id: register_id.map(str::to_string),
            kind: PaymentKind::Income,
            method,
            status,
            amount_cents: 4_200,
            order_id: None,
            legacy_client_id: None,
            employee_id: "emp-1".to_string(),
            reference: Some("REF-1".to_string()),
            notes: None,
            gateway_payment_id: None,
            check: (method == PaymentMethod::Check).then(|| CheckDetails {
                bank: "Macro".to_string(),
                check_number: "445566".to_string(),
                issuer: Some("Juan Gómez".to_string()),
                due_date: NaiveDate::from_ymd_opt(2026, 11, 15).unwrap(),
                compensation_status: CompensationStatus::Pending,
                compensated_at: None,
            }),
            installments: (method == PaymentMethod::CreditCard).then_some(InstallmentPlan {
                count: 3,
                interest_bps: 1_000,
                installment_cents: 1_540,
                financed_total_cents: 4_620,
            }),
            cancel_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn with_register(db: &Database) -> String {
        let register = open_register(0);
        db.cash_registers().insert_open(db.pool(), &register).await.unwrap();
        register.id
    }

    #[tokio::test]
    async fn test_insert_and_fetch_sub_records() {
        let db = test_db().await;
        let register_id = with_register(&db).await;
        let repo = db.payments();

        let check = payment(Some(&register_id), PaymentMethod::Check, PaymentStatus::Completed);
        let card = payment(Some(&register_id), PaymentMethod::CreditCard, PaymentStatus::Completed);
        repo.insert(db.pool(), &check).await.unwrap();
        repo.insert(db.pool(), &card).await.unwrap();

        let loaded = repo.fetch(db.pool(), &check.id).await.unwrap().unwrap();
        let details = loaded.check.unwrap();
        assert_eq!(details.bank, "Macro");
        assert_eq!(details.compensation_status, CompensationStatus::Pending);
        assert!(loaded.installments.is_none());

        let loaded = repo.fetch(db.pool(), &card.id).await.unwrap().unwrap();
        assert_eq!(loaded.installments.unwrap().financed_total_cents, 4_620);
        assert!(loaded.check.is_none());

        assert!(repo.fetch(db.pool(), "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gateway_id_is_unique() {
        let db = test_db().await;
        let repo = db.payments();

        let mut first = payment(None, PaymentMethod::MercadoPago, PaymentStatus::Pending);
        first.gateway_payment_id = Some("mp-123".to_string());
        repo.insert(db.pool(), &first).await.unwrap();

        let found = repo.fetch_by_gateway_id(db.pool(), "mp-123").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);

        let mut dup = payment(None, PaymentMethod::MercadoPago, PaymentStatus::Pending);
        dup.gateway_payment_id = Some("mp-123".to_string());
        let err = repo.insert(db.pool(), &dup).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_completed_payment_requires_register() {
        let db = test_db().await;
        let orphan = payment(None, PaymentMethod::Cash, PaymentStatus::Completed);
        assert!(db.payments().insert(db.pool(), &orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_guarded_status_updates() {
        let db = test_db().await;
        let register_id = with_register(&db).await;
        let repo = db.payments();

        let pending = payment(None, PaymentMethod::MercadoPago, PaymentStatus::Pending);
        repo.insert(db.pool(), &pending).await.unwrap();

        repo.mark_completed(db.pool(), &pending.id, &register_id).await.unwrap();
        let done = repo.fetch(db.pool(), &pending.id).await.unwrap().unwrap();
        assert_eq!(done.status, PaymentStatus::Completed);
        assert_eq!(done.register_id.as_deref(), Some(register_id.as_str()));

        // Completing twice matches no row
        assert!(matches!(
            repo.mark_completed(db.pool(), &pending.id, &register_id).await,
            Err(DbError::Conflict(_))
        ));

        repo.cancel(db.pool(), &pending.id, PaymentStatus::Completed, "duplicate", "emp-9")
            .await
            .unwrap();
        let cancelled = repo.fetch(db.pool(), &pending.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("duplicate"));
        assert!(cancelled.cancelled_at.is_some());

        assert!(matches!(
            repo.update_status(db.pool(), &pending.id, PaymentStatus::Completed, PaymentStatus::Rejected)
                .await,
            Err(DbError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_compensation() {
        let db = test_db().await;
        let register_id = with_register(&db).await;
        let repo = db.payments();

        let check = payment(Some(&register_id), PaymentMethod::Check, PaymentStatus::Completed);
        repo.insert(db.pool(), &check).await.unwrap();

        repo.update_compensation(
            db.pool(),
            &check.id,
            CompensationStatus::Pending,
            CompensationStatus::Compensated,
        )
        .await
        .unwrap();

        let loaded = repo.fetch(db.pool(), &check.id).await.unwrap().unwrap();
        let details = loaded.check.unwrap();
        assert_eq!(details.compensation_status, CompensationStatus::Compensated);
        assert!(details.compensated_at.is_some());

        assert!(repo
            .update_compensation(
                db.pool(),
                &check.id,
                CompensationStatus::Pending,
                CompensationStatus::Rejected,
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let register_id = with_register(&db).await;
        let repo = db.payments();

        for method in [PaymentMethod::Cash, PaymentMethod::Cash, PaymentMethod::BankTransfer] {
            repo.insert(db.pool(), &payment(Some(&register_id), method, PaymentStatus::Completed))
                .await
                .unwrap();
        }
        repo.insert(db.pool(), &payment(None, PaymentMethod::MercadoPago, PaymentStatus::Pending))
            .await
            .unwrap();

        let cash = PaymentFilter {
            method: Some(PaymentMethod::Cash),
            ..Default::default()
        };
        assert_eq!(repo.list(&cash, PageRequest::default()).await.unwrap().total, 2);

        let in_register = PaymentFilter {
            register_id: Some(register_id.clone()),
            ..Default::default()
        };
        let page = repo.list(&in_register, PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);

        let today = Utc::now().date_naive();
        let today_only = PaymentFilter {
            from: Some(today),
            to: Some(today),
            ..Default::default()
        };
        assert_eq!(repo.list(&today_only, PageRequest::default()).await.unwrap().total, 4);

        let yesterday = today.pred_opt().unwrap();
        let before = PaymentFilter {
            to: Some(yesterday),
            ..Default::default()
        };
        assert_eq!(repo.list(&before, PageRequest::default()).await.unwrap().total, 0);

        assert_eq!(repo.list_for_register(db.pool(), &register_id).await.unwrap().len(), 3);
    }
}
