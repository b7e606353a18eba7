//! Payment service.
//!
//! Every write touches up to four records and runs in one transaction:
//!
//! ```text
//! create (completed)                 cancel (was completed)
//! ──────────────────                 ──────────────────────
//! payments       INSERT              payments       status = cancelled
//! cash_registers totals += delta     cash_registers totals -= delta
//! orders         paid += amount      orders         paid -= amount
//!   or legacy_clients debt -= amount   or legacy_clients debt += amount
//! ```
//!
//! A bounced check reverses the order/debt effect only; the register keeps
//! counting it, since the paper check did go into the till.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use optica_core::payment_calculation::{installment_plan, payment_delta};
use optica_core::payment_status::{ensure_compensation_transition, ensure_payment_transition};
use optica_core::payment_validation::{
    ensure_cancellable, ensure_register_open, validate_debt_payment, validate_new_payment,
    validate_order_payment,
};
use optica_core::validation::{validate_page, validate_required_text};
use optica_core::{
    CheckDetails, CompensationStatus, CoreError, NewPayment, Page, PageRequest, Payment,
    PaymentFilter, PaymentKind, PaymentStatus, Rate,
};
use optica_db::{Database, DbError, SqliteConnection};

use crate::error::{ApiError, ApiResult};

/// Body of `POST /api/payments/{id}/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPayment {
    pub reason: String,
    pub cancelled_by: String,
}

/// Body of `PUT /api/payments/{id}/check-status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateCheckStatus {
    pub status: CompensationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Apply,
    Reverse,
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    db: Database,
}

impl PaymentService {
    pub fn new(db: Database) -> Self {
        PaymentService { db }
    }

    /// Records a completed payment in the open register.
    pub async fn create(&self, new: NewPayment) -> ApiResult<Payment> {
        self.book(new, None, PaymentStatus::Completed).await
    }

    /// Records a payment reported by Mercado Pago, completed or pending.
    pub async fn create_from_gateway(
        &self,
        new: NewPayment,
        gateway_payment_id: &str,
        status: PaymentStatus,
    ) -> ApiResult<Payment> {
        self.book(new, Some(gateway_payment_id.to_string()), status)
            .await
    }

    async fn book(
        &self,
        new: NewPayment,
        gateway_payment_id: Option<String>,
        status: PaymentStatus,
    ) -> ApiResult<Payment> {
        validate_new_payment(&new)?;
        let amount = new.amount();

        let mut tx = self.db.begin().await?;

        // Pending payments join a register only when they complete
        let register_id = if status == PaymentStatus::Completed {
            let open = self.db.cash_registers().fetch_open(&mut *tx).await?;
            Some(ensure_register_open(open.as_ref())?.id.clone())
        } else {
            None
        };

        if let Some(order_id) = new.order_id.as_deref() {
            let order = self
                .db
                .orders()
                .fetch(&mut *tx, order_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Order", order_id))?;
            validate_order_payment(&order, amount)?;
        }
        if let Some(client_id) = new.legacy_client_id.as_deref() {
            let client = self
                .db
                .legacy_clients()
                .fetch(&mut *tx, client_id)
                .await?
                .ok_or_else(|| CoreError::not_found("LegacyClient", client_id))?;
            validate_debt_payment(&client, amount)?;
        }

        let installments = new
            .installments
            .map(|req| installment_plan(amount, req.count, Rate::from_bps(req.interest_bps)))
            .transpose()?;

        let check = new.check.map(|c| CheckDetails {
            bank: c.bank.trim().to_string(),
            check_number: c.check_number.trim().to_string(),
            issuer: c.issuer,
            due_date: c.due_date,
            compensation_status: CompensationStatus::Pending,
            compensated_at: None,
        });

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            register_id,
            kind: new.kind,
            method: new.method,
            status,
            amount_cents: new.amount_cents,
            order_id: new.order_id,
            legacy_client_id: new.legacy_client_id,
            employee_id: new.employee_id,
            reference: new.reference,
            notes: new.notes,
            gateway_payment_id,
            check,
            installments,
            cancel_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.payments().insert(&mut *tx, &payment).await?;

        if let Some(register_id) = payment.register_id.as_deref() {
            self.db
                .cash_registers()
                .apply_delta(&mut *tx, register_id, &payment_delta(&payment))
                .await?;
            self.apply_target_effect(&mut tx, &payment, Effect::Apply)
                .await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            payment_id = %payment.id,
            kind = payment.kind.as_str(),
            method = payment.method.as_str(),
            status = payment.status.as_str(),
            amount = %payment.amount(),
            register_id = ?payment.register_id,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Cancels a payment, reversing its effects when it was completed.
    pub async fn cancel(&self, id: &str, request: CancelPayment) -> ApiResult<Payment> {
        validate_required_text("reason", &request.reason, 500)?;
        validate_required_text("cancelled_by", &request.cancelled_by, 64)?;

        let mut tx = self.db.begin().await?;
        let payment = self.load(&mut tx, id).await?;
        self.cancel_in(&mut tx, &payment, request.reason.trim(), &request.cancelled_by)
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            payment_id = %id,
            amount = %payment.amount(),
            cancelled_by = %request.cancelled_by,
            "Payment cancelled"
        );

        self.get(id).await
    }

    /// Cancels `payment` on an open connection; the caller commits.
    pub(crate) async fn cancel_in(
        &self,
        conn: &mut SqliteConnection,
        payment: &Payment,
        reason: &str,
        cancelled_by: &str,
    ) -> ApiResult<()> {
        let register = match payment.register_id.as_deref() {
            Some(register_id) => self.db.cash_registers().fetch(&mut *conn, register_id).await?,
            None => None,
        };
        ensure_cancellable(payment, register.as_ref())?;

        self.db
            .payments()
            .cancel(&mut *conn, &payment.id, payment.status, reason, cancelled_by)
            .await?;

        if payment.status == PaymentStatus::Completed {
            if let Some(register_id) = payment.register_id.as_deref() {
                self.db
                    .cash_registers()
                    .apply_delta(&mut *conn, register_id, &payment_delta(payment).negated())
                    .await?;
            }
            self.apply_target_effect(conn, payment, Effect::Reverse)
                .await?;
        }

        Ok(())
    }

    /// Moves a check through its compensation states.
    ///
    /// A rejected check also rejects the payment and gives the amount back
    /// to the order balance or client debt. Register totals stay as they are.
    pub async fn update_check_status(
        &self,
        id: &str,
        request: UpdateCheckStatus,
    ) -> ApiResult<Payment> {
        let to = request.status;
        let mut tx = self.db.begin().await?;
        let payment = self.load(&mut tx, id).await?;

        let from = payment
            .check
            .as_ref()
            .map(|check| check.compensation_status)
            .ok_or_else(|| CoreError::NotACheckPayment {
                payment_id: payment.id.clone(),
            })?;

        if payment.status != PaymentStatus::Completed {
            return Err(CoreError::not_allowed(format!(
                "check payment is {}, only completed checks can be compensated or rejected",
                payment.status.as_str()
            ))
            .into());
        }
        ensure_compensation_transition(from, to)?;

        self.db
            .payments()
            .update_compensation(&mut *tx, id, from, to)
            .await?;

        if to == CompensationStatus::Rejected {
            ensure_payment_transition(PaymentStatus::Completed, PaymentStatus::Rejected)?;
            self.db
                .payments()
                .update_status(&mut *tx, id, PaymentStatus::Completed, PaymentStatus::Rejected)
                .await?;
            self.apply_target_effect(&mut tx, &payment, Effect::Reverse)
                .await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        if to == CompensationStatus::Rejected {
            warn!(payment_id = %id, amount = %payment.amount(), "Check rejected by the bank");
        } else {
            info!(payment_id = %id, "Check compensated");
        }

        self.get(id).await
    }

    /// Completes a pending gateway payment in the open register.
    pub async fn complete_pending(&self, id: &str) -> ApiResult<Payment> {
        let mut tx = self.db.begin().await?;
        let payment = self.load(&mut tx, id).await?;
        ensure_payment_transition(payment.status, PaymentStatus::Completed)?;

        let open = self.db.cash_registers().fetch_open(&mut *tx).await?;
        let register_id = ensure_register_open(open.as_ref())?.id.clone();

        match payment.kind {
            PaymentKind::OrderPayment => {
                if let Some(order_id) = payment.order_id.as_deref() {
                    let order = self
                        .db
                        .orders()
                        .fetch(&mut *tx, order_id)
                        .await?
                        .ok_or_else(|| CoreError::not_found("Order", order_id))?;
                    validate_order_payment(&order, payment.amount())?;
                }
            }
            PaymentKind::DebtPayment => {
                if let Some(client_id) = payment.legacy_client_id.as_deref() {
                    let client = self
                        .db
                        .legacy_clients()
                        .fetch(&mut *tx, client_id)
                        .await?
                        .ok_or_else(|| CoreError::not_found("LegacyClient", client_id))?;
                    validate_debt_payment(&client, payment.amount())?;
                }
            }
            PaymentKind::Income | PaymentKind::Expense | PaymentKind::Withdrawal => {}
        }

        self.db
            .payments()
            .mark_completed(&mut *tx, id, &register_id)
            .await?;
        self.db
            .cash_registers()
            .apply_delta(&mut *tx, &register_id, &payment_delta(&payment))
            .await?;
        self.apply_target_effect(&mut tx, &payment, Effect::Apply)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(payment_id = %id, register_id = %register_id, "Pending payment completed");

        self.get(id).await
    }

    /// Closes a pending payment the gateway gave up on.
    pub async fn fail_pending(
        &self,
        id: &str,
        to: PaymentStatus,
        reason: &str,
        actor: &str,
    ) -> ApiResult<Payment> {
        let payment = self.get(id).await?;
        if payment.status != PaymentStatus::Pending {
            return Err(CoreError::InvalidPaymentTransition {
                from: payment.status.as_str().to_string(),
                to: to.as_str().to_string(),
            }
            .into());
        }
        ensure_payment_transition(payment.status, to)?;

        let repo = self.db.payments();
        match to {
            PaymentStatus::Cancelled => {
                repo.cancel(self.db.pool(), id, PaymentStatus::Pending, reason, actor)
                    .await?
            }
            _ => {
                repo.update_status(self.db.pool(), id, PaymentStatus::Pending, to)
                    .await?
            }
        }

        info!(payment_id = %id, status = to.as_str(), "Pending payment closed");

        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Payment> {
        self.db
            .payments()
            .fetch(self.db.pool(), id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Payment not found: {id}")))
    }

    pub async fn list(&self, filter: &PaymentFilter, page: PageRequest) -> ApiResult<Page<Payment>> {
        validate_page(&page)?;
        Ok(self.db.payments().list(filter, page).await?)
    }

    async fn load(&self, conn: &mut SqliteConnection, id: &str) -> ApiResult<Payment> {
        self.db
            .payments()
            .fetch(&mut *conn, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Payment not found: {id}")))
    }

    async fn apply_target_effect(
        &self,
        conn: &mut SqliteConnection,
        payment: &Payment,
        effect: Effect,
    ) -> ApiResult<()> {
        let amount = payment.amount();
        match payment.kind {
            PaymentKind::OrderPayment => {
                if let Some(order_id) = payment.order_id.as_deref() {
                    let delta = if effect == Effect::Apply { amount } else { -amount };
                    self.db
                        .orders()
                        .apply_paid_delta(conn, order_id, delta)
                        .await?;
                }
            }
            PaymentKind::DebtPayment => {
                if let Some(client_id) = payment.legacy_client_id.as_deref() {
                    let (delta, paid_at) = match effect {
                        Effect::Apply => (-amount, Some(Utc::now())),
                        Effect::Reverse => (amount, None),
                    };
                    self.db
                        .legacy_clients()
                        .apply_debt_delta(conn, client_id, delta, paid_at)
                        .await?;
                }
            }
            PaymentKind::Income | PaymentKind::Expense | PaymentKind::Withdrawal => {}
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support::*;
    use chrono::NaiveDate;
    use optica_core::{InstallmentRequest, Money, NewCheck, OrderPaymentStatus, PaymentMethod};

    fn cancel_request() -> CancelPayment {
        CancelPayment {
            reason: "Cargado por error".to_string(),
            cancelled_by: "emp-2".to_string(),
        }
    }

    fn check_payment(order_id: &str, amount_cents: i64) -> NewPayment {
        NewPayment {
            check: Some(NewCheck {
                bank: "Banco Nación".to_string(),
                check_number: "00012345".to_string(),
                issuer: Some("Rosa Medina".to_string()),
                due_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            }),
            ..order_payment(order_id, PaymentMethod::Check, amount_cents)
        }
    }

    #[tokio::test]
    async fn test_create_requires_open_register() {
        let db = test_db().await;
        let service = PaymentService::new(db.clone());

        let err = service
            .create(payment(PaymentKind::Income, PaymentMethod::Cash, 1_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
        assert_eq!(err.message, "No cash register is open");
    }

    #[tokio::test]
    async fn test_order_payment_updates_order_and_register() {
        let db = test_db().await;
        let register_id = open_register(&db, 10_000).await;
        let order = create_order(&db, 50_000).await;
        let service = PaymentService::new(db.clone());

        let payment = service
            .create(order_payment(&order.id, PaymentMethod::Cash, 20_000))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.register_id.as_deref(), Some(register_id.as_str()));

        let order = db.orders().fetch(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.paid_cents, 20_000);
        assert_eq!(order.payment_status, OrderPaymentStatus::Partial);

        let register = db.cash_registers().fetch(db.pool(), &register_id).await.unwrap().unwrap();
        assert_eq!(register.totals.sales.cash, Money::from_cents(20_000));
        assert_eq!(register.totals.total_sales, Money::from_cents(20_000));

        // Remaining balance is 30_000
        let err = service
            .create(order_payment(&order.id, PaymentMethod::DebitCard, 30_001))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        service
            .create(order_payment(&order.id, PaymentMethod::DebitCard, 30_000))
            .await
            .unwrap();
        let order = db.orders().fetch(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_reverses_everything() {
        let db = test_db().await;
        let register_id = open_register(&db, 0).await;
        let order = create_order(&db, 50_000).await;
        let service = PaymentService::new(db.clone());

        let payment = service
            .create(order_payment(&order.id, PaymentMethod::CreditCard, 50_000))
            .await
            .unwrap();
        let cancelled = service.cancel(&payment.id, cancel_request()).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by.as_deref(), Some("emp-2"));

        let register = db.cash_registers().fetch(db.pool(), &register_id).await.unwrap().unwrap();
        assert!(register.totals.is_zero());

        let order = db.orders().fetch(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.paid_cents, 0);
        assert_eq!(order.payment_status, OrderPaymentStatus::Pending);

        // Second cancel is an invalid transition
        let err = service.cancel(&payment.id, cancel_request()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_cancel_needs_reason() {
        let db = test_db().await;
        open_register(&db, 0).await;
        let service = PaymentService::new(db.clone());
        let payment = service
            .create(payment(PaymentKind::Income, PaymentMethod::Cash, 1_000))
            .await
            .unwrap();

        let err = service
            .cancel(
                &payment.id,
                CancelPayment {
                    reason: "  ".to_string(),
                    cancelled_by: "emp-1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_debt_payment_and_cancel() {
        let db = test_db().await;
        let register_id = open_register(&db, 0).await;
        let client_id = create_client(&db, "20345678", 30_000).await;
        let service = PaymentService::new(db.clone());

        let new = NewPayment {
            legacy_client_id: Some(client_id.clone()),
            ..payment(PaymentKind::DebtPayment, PaymentMethod::Cash, 12_000)
        };
        let paid = service.create(new.clone()).await.unwrap();

        let client = db.legacy_clients().fetch(db.pool(), &client_id).await.unwrap().unwrap();
        assert_eq!(client.current_debt_cents, 18_000);
        assert!(client.last_payment_at.is_some());

        let register = db.cash_registers().fetch(db.pool(), &register_id).await.unwrap().unwrap();
        assert_eq!(register.totals.payments_received, Money::from_cents(12_000));
        assert!(register.totals.total_sales.is_zero());

        // More than the remaining debt
        let too_much = NewPayment {
            amount_cents: 18_001,
            ..new
        };
        assert!(service.create(too_much).await.is_err());

        service.cancel(&paid.id, cancel_request()).await.unwrap();
        let client = db.legacy_clients().fetch(db.pool(), &client_id).await.unwrap().unwrap();
        assert_eq!(client.current_debt_cents, 30_000);
    }

    #[tokio::test]
    async fn test_installments_are_computed() {
        let db = test_db().await;
        open_register(&db, 0).await;
        let order = create_order(&db, 120_000).await;
        let service = PaymentService::new(db.clone());

        let new = NewPayment {
            installments: Some(InstallmentRequest {
                count: 6,
                interest_bps: 1_500,
            }),
            ..order_payment(&order.id, PaymentMethod::CreditCard, 120_000)
        };
        let payment = service.create(new).await.unwrap();
        let plan = payment.installments.unwrap();
        assert_eq!(plan.financed_total_cents, 138_000);
        assert_eq!(plan.installment_cents, 23_000);

        // The order is credited with the amount, not the financed total
        let order = db.orders().fetch(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.paid_cents, 120_000);
    }

    #[tokio::test]
    async fn test_check_rejection_reverses_order_but_not_register() {
        let db = test_db().await;
        let register_id = open_register(&db, 0).await;
        let order = create_order(&db, 40_000).await;
        let service = PaymentService::new(db.clone());

        let payment = service.create(check_payment(&order.id, 40_000)).await.unwrap();
        let rejected = service
            .update_check_status(
                &payment.id,
                UpdateCheckStatus {
                    status: CompensationStatus::Rejected,
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(
            rejected.check.as_ref().unwrap().compensation_status,
            CompensationStatus::Rejected
        );

        let order = db.orders().fetch(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.paid_cents, 0);

        let register = db.cash_registers().fetch(db.pool(), &register_id).await.unwrap().unwrap();
        assert_eq!(register.totals.sales.check, Money::from_cents(40_000));

        // Terminal
        let err = service
            .update_check_status(
                &payment.id,
                UpdateCheckStatus {
                    status: CompensationStatus::Compensated,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_check_compensation_on_non_check_payment() {
        let db = test_db().await;
        open_register(&db, 0).await;
        let service = PaymentService::new(db.clone());
        let payment = service
            .create(payment(PaymentKind::Income, PaymentMethod::Cash, 1_000))
            .await
            .unwrap();

        let err = service
            .update_check_status(
                &payment.id,
                UpdateCheckStatus {
                    status: CompensationStatus::Compensated,
                },
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("not a check payment"));
    }

    #[tokio::test]
    async fn test_pending_gateway_payment_lifecycle() {
        let db = test_db().await;
        let order = create_order(&db, 25_000).await;
        let service = PaymentService::new(db.clone());

        // No register needed while pending
        let pending = service
            .create_from_gateway(
                order_payment(&order.id, PaymentMethod::MercadoPago, 25_000),
                "mp-1",
                PaymentStatus::Pending,
            )
            .await
            .unwrap();
        assert!(pending.register_id.is_none());

        // Completing needs one
        assert!(service.complete_pending(&pending.id).await.is_err());

        let register_id = open_register(&db, 0).await;
        let completed = service.complete_pending(&pending.id).await.unwrap();
        assert_eq!(completed.status, PaymentStatus::Completed);
        assert_eq!(completed.register_id.as_deref(), Some(register_id.as_str()));

        let register = db.cash_registers().fetch(db.pool(), &register_id).await.unwrap().unwrap();
        assert_eq!(register.totals.sales.mercado_pago, Money::from_cents(25_000));
        let order = db.orders().fetch(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_fail_pending() {
        let db = test_db().await;
        let order = create_order(&db, 25_000).await;
        let service = PaymentService::new(db.clone());

        let pending = service
            .create_from_gateway(
                order_payment(&order.id, PaymentMethod::MercadoPago, 25_000),
                "mp-2",
                PaymentStatus::Pending,
            )
            .await
            .unwrap();
        let rejected = service
            .fail_pending(&pending.id, PaymentStatus::Rejected, "rejected", "mercadopago")
            .await
            .unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);

        assert!(service
            .fail_pending(&pending.id, PaymentStatus::Cancelled, "cancelled", "mercadopago")
            .await
            .is_err());
    }
}
