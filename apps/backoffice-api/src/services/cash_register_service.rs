//! Cash register service.
//!
//! One register may be open at a time. Closing it freezes the totals and
//! records the counted cash against what the payments say should be there.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use optica_core::payment_calculation::{expected_cash, summarize};
use optica_core::validation::{
    validate_non_negative_cents, validate_optional_text, validate_page, validate_required_text,
};
use optica_core::{
    CashRegister, CoreError, Money, Page, PageRequest, Payment, RegisterFilter, RegisterStatus,
    RegisterSummary, RegisterTotals,
};
use optica_db::{Database, DbError, RegisterClosing};

use crate::error::{ApiError, ApiResult};

/// Body of `POST /api/cash-registers/open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRegister {
    pub opening_balance_cents: i64,
    pub opened_by: String,
    pub notes: Option<String>,
}

/// Body of `POST /api/cash-registers/{id}/close`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRegister {
    /// Cash physically counted in the till.
    pub counted_balance_cents: i64,
    pub closed_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CashRegisterService {
    db: Database,
}

impl CashRegisterService {
    pub fn new(db: Database) -> Self {
        CashRegisterService { db }
    }

    pub async fn open(&self, request: OpenRegister) -> ApiResult<CashRegister> {
        validate_non_negative_cents("opening_balance_cents", request.opening_balance_cents)?;
        validate_required_text("opened_by", &request.opened_by, 64)?;
        validate_optional_text("notes", request.notes.as_deref(), 1000)?;

        if let Some(open) = self.db.cash_registers().fetch_open(self.db.pool()).await? {
            return Err(CoreError::RegisterAlreadyOpen {
                register_id: open.id,
            }
            .into());
        }

        let register = CashRegister {
            id: Uuid::new_v4().to_string(),
            status: RegisterStatus::Open,
            opened_by: request.opened_by,
            opened_at: Utc::now(),
            opening_balance_cents: request.opening_balance_cents,
            totals: RegisterTotals::default(),
            closed_by: None,
            closed_at: None,
            closing_balance_cents: None,
            expected_balance_cents: None,
            difference_cents: None,
            notes: request.notes,
        };

        // The partial unique index catches a concurrent open
        self.db
            .cash_registers()
            .insert_open(self.db.pool(), &register)
            .await?;

        info!(
            register_id = %register.id,
            opened_by = %register.opened_by,
            opening_balance = %register.opening_balance(),
            "Cash register opened"
        );

        Ok(register)
    }

    /// The open register, if any.
    pub async fn current(&self) -> ApiResult<Option<CashRegister>> {
        Ok(self.db.cash_registers().fetch_open(self.db.pool()).await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<CashRegister> {
        self.db
            .cash_registers()
            .fetch(self.db.pool(), id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Cash register not found: {id}")))
    }

    pub async fn list(
        &self,
        filter: &RegisterFilter,
        page: PageRequest,
    ) -> ApiResult<Page<CashRegister>> {
        validate_page(&page)?;
        Ok(self.db.cash_registers().list(filter, page).await?)
    }

    /// Closes the register with the cash counted by the cashier.
    ///
    /// ```text
    /// expected   = opening + cash in - cash out   (till-affecting payments)
    /// difference = counted - expected             (negative: cash missing)
    /// ```
    pub async fn close(&self, id: &str, request: CloseRegister) -> ApiResult<CashRegister> {
        validate_non_negative_cents("counted_balance_cents", request.counted_balance_cents)?;
        validate_required_text("closed_by", &request.closed_by, 64)?;
        validate_optional_text("notes", request.notes.as_deref(), 1000)?;

        let mut tx = self.db.begin().await?;

        let register = self
            .db
            .cash_registers()
            .fetch(&mut *tx, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Cash register not found: {id}")))?;
        if !register.is_open() {
            return Err(CoreError::RegisterClosed {
                register_id: register.id,
            }
            .into());
        }

        let payments = self
            .db
            .payments()
            .list_for_register(&mut *tx, id)
            .await?;
        let expected = expected_cash(register.opening_balance(), &payments);
        let counted = Money::from_cents(request.counted_balance_cents);
        let difference = counted - expected;

        let closing = RegisterClosing {
            closed_by: request.closed_by,
            closed_at: Utc::now(),
            closing_balance_cents: counted.cents(),
            expected_balance_cents: expected.cents(),
            difference_cents: difference.cents(),
            notes: request.notes,
        };
        self.db.cash_registers().close(&mut *tx, id, &closing).await?;

        tx.commit().await.map_err(DbError::from)?;

        if difference.is_zero() {
            info!(register_id = %id, expected = %expected, "Cash register closed");
        } else {
            warn!(
                register_id = %id,
                expected = %expected,
                counted = %counted,
                difference = %difference,
                "Cash register closed with a difference"
            );
        }

        self.get(id).await
    }

    /// End-of-day report, with running totals checked against the payments.
    pub async fn summary(&self, id: &str) -> ApiResult<RegisterSummary> {
        let register = self.get(id).await?;
        let payments = self.payments(id).await?;
        let summary = summarize(&register, &payments);

        if !summary.is_reconciled() {
            warn!(
                register_id = %id,
                discrepancies = ?summary.discrepancies,
                "Register totals disagree with its payments"
            );
        }

        Ok(summary)
    }

    /// Every payment booked in the register, cancelled ones included.
    pub async fn payments(&self, id: &str) -> ApiResult<Vec<Payment>> {
        // 404 rather than an empty list for unknown registers
        self.get(id).await?;
        Ok(self
            .db
            .payments()
            .list_for_register(self.db.pool(), id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::payment_service::{CancelPayment, PaymentService};
    use crate::services::test_support::*;
    use optica_core::{PaymentKind, PaymentMethod};

    fn close_request(counted: i64) -> CloseRegister {
        CloseRegister {
            counted_balance_cents: counted,
            closed_by: "emp-1".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_only_one_register_open() {
        let db = test_db().await;
        let service = CashRegisterService::new(db.clone());
        let first = open_register(&db, 5_000).await;

        let err = service
            .open(OpenRegister {
                opening_balance_cents: 0,
                opened_by: "emp-2".to_string(),
                notes: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(err.message.contains(&first));

        let current = service.current().await.unwrap().unwrap();
        assert_eq!(current.id, first);
    }

    #[tokio::test]
    async fn test_open_rejects_negative_balance() {
        let db = test_db().await;
        let err = CashRegisterService::new(db)
            .open(OpenRegister {
                opening_balance_cents: -1,
                opened_by: "emp-1".to_string(),
                notes: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_close_computes_difference() {
        let db = test_db().await;
        let register_id = open_register(&db, 10_000).await;
        let payments = PaymentService::new(db.clone());
        let service = CashRegisterService::new(db.clone());

        payments
            .create(payment(PaymentKind::Income, PaymentMethod::Cash, 5_000))
            .await
            .unwrap();
        payments
            .create(payment(PaymentKind::Expense, PaymentMethod::Cash, 2_000))
            .await
            .unwrap();
        // Card payments never touch the till
        payments
            .create(payment(PaymentKind::Income, PaymentMethod::DebitCard, 9_000))
            .await
            .unwrap();

        let closed = service.close(&register_id, close_request(12_500)).await.unwrap();
        assert_eq!(closed.status, RegisterStatus::Closed);
        assert_eq!(closed.expected_balance_cents, Some(13_000));
        assert_eq!(closed.closing_balance_cents, Some(12_500));
        assert_eq!(closed.difference_cents, Some(-500));
        assert!(service.current().await.unwrap().is_none());

        // Closing twice is refused
        let err = service.close(&register_id, close_request(0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_closed_register_is_frozen() {
        let db = test_db().await;
        let register_id = open_register(&db, 0).await;
        let payments = PaymentService::new(db.clone());
        let service = CashRegisterService::new(db.clone());

        let paid = payments
            .create(payment(PaymentKind::Income, PaymentMethod::Cash, 3_000))
            .await
            .unwrap();
        service.close(&register_id, close_request(3_000)).await.unwrap();

        let err = payments
            .cancel(
                &paid.id,
                CancelPayment {
                    reason: "late".to_string(),
                    cancelled_by: "emp-1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
        assert!(err.message.contains("is closed"));

        // A new day, a new register
        let next = open_register(&db, 3_000).await;
        assert_ne!(next, register_id);
    }

    #[tokio::test]
    async fn test_summary_reconciles() {
        let db = test_db().await;
        let register_id = open_register(&db, 1_000).await;
        let order = create_order(&db, 20_000).await;
        let payments = PaymentService::new(db.clone());

        payments
            .create(order_payment(&order.id, PaymentMethod::Cash, 8_000))
            .await
            .unwrap();
        let card = payments
            .create(order_payment(&order.id, PaymentMethod::CreditCard, 12_000))
            .await
            .unwrap();
        payments
            .cancel(
                &card.id,
                CancelPayment {
                    reason: "wrong card".to_string(),
                    cancelled_by: "emp-1".to_string(),
                },
            )
            .await
            .unwrap();

        let summary = CashRegisterService::new(db.clone())
            .summary(&register_id)
            .await
            .unwrap();
        assert!(summary.is_reconciled());
        assert_eq!(summary.payment_count, 1);
        assert_eq!(summary.cancelled_count, 1);
        assert_eq!(summary.expected_cash, Money::from_cents(9_000));
        assert_eq!(summary.running_totals.total_sales, Money::from_cents(8_000));
    }

    #[tokio::test]
    async fn test_unknown_register() {
        let db = test_db().await;
        let service = CashRegisterService::new(db);
        assert_eq!(service.get("missing").await.unwrap_err().code, ErrorCode::NotFound);
        assert_eq!(service.payments("missing").await.unwrap_err().code, ErrorCode::NotFound);
    }
}
