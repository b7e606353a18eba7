//! Order service.
//!
//! ## Order Lifecycle
//! ```text
//!   pending ──► in_laboratory ──► ready ──► delivered
//!      │   └──────────────────────►  │
//!      │             │               │
//!      └─────────────┴───────────────┴──► cancelled
//! ```
//!
//! Cancelling an order cancels its payments first, so the register and the
//! order balance never disagree.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use optica_core::payment_status::{ensure_order_transition, order_payment_status};
use optica_core::validation::{validate_new_order, validate_page, validate_required_text};
use optica_core::{
    CoreError, Laboratory, Money, NewOrder, Order, OrderFilter, OrderItem, OrderStatus, Page,
    PageRequest, Payment, PaymentStatus, ValidationError,
};
use optica_db::{Database, DbError, SqliteConnection};

use crate::error::{ApiError, ApiResult};
use crate::services::payment_service::PaymentService;

/// Body of `PUT /api/orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
    pub employee_id: String,
    /// Only used when `status` is `cancelled`.
    pub reason: Option<String>,
}

/// Body of `PUT /api/orders/{id}/laboratory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignLaboratory {
    pub laboratory_id: Option<String>,
}

/// Body of `POST /api/orders/{id}/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrder {
    pub reason: String,
    pub cancelled_by: String,
}

#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
}

impl OrderService {
    pub fn new(db: Database) -> Self {
        OrderService { db }
    }

    pub async fn create(&self, new: NewOrder) -> ApiResult<Order> {
        validate_new_order(&new)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // First write of the transaction: concurrent creates queue here
        let order_number = self.db.orders().next_order_number(&mut *tx, now).await?;

        if let Some(lab_id) = new.laboratory_id.as_deref() {
            self.active_laboratory(&mut tx, lab_id).await?;
        }

        let id = Uuid::new_v4().to_string();
        let subtotal = new.subtotal()?;
        let total = subtotal - Money::from_cents(new.discount_cents);

        let items = new
            .items
            .iter()
            .map(|item| {
                Ok(OrderItem {
                    id: Uuid::new_v4().to_string(),
                    order_id: id.clone(),
                    product_name: item.product_name.trim().to_string(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    line_total_cents: item.line_total()?.cents(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let order = Order {
            id,
            order_number,
            client_name: new.client_name.trim().to_string(),
            client_phone: new.client_phone,
            client_document: new.client_document,
            employee_id: new.employee_id,
            laboratory_id: new.laboratory_id,
            status: OrderStatus::Pending,
            // A fully discounted order owes nothing
            payment_status: order_payment_status(Money::zero(), total),
            subtotal_cents: subtotal.cents(),
            discount_cents: new.discount_cents,
            total_cents: total.cents(),
            paid_cents: 0,
            notes: new.notes,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
            items,
        };

        self.db.orders().insert(&mut tx, &order).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            items = order.items.len(),
            "Order created"
        );

        Ok(order)
    }

    /// The order with its items.
    pub async fn get(&self, id: &str) -> ApiResult<Order> {
        self.db
            .orders()
            .fetch_with_items(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Order not found: {id}")))
    }

    pub async fn list(&self, filter: &OrderFilter, page: PageRequest) -> ApiResult<Page<Order>> {
        validate_page(&page)?;
        Ok(self.db.orders().list(filter, page).await?)
    }

    pub async fn update_status(&self, id: &str, request: UpdateOrderStatus) -> ApiResult<Order> {
        validate_required_text("employee_id", &request.employee_id, 64)?;

        if request.status == OrderStatus::Cancelled {
            let reason = request
                .reason
                .unwrap_or_else(|| "Cancelled from status change".to_string());
            return self
                .cancel(
                    id,
                    CancelOrder {
                        reason,
                        cancelled_by: request.employee_id,
                    },
                )
                .await;
        }

        let mut tx = self.db.begin().await?;
        let order = self.load(&mut tx, id).await?;
        ensure_order_transition(order.status, request.status)?;

        if request.status == OrderStatus::InLaboratory {
            let lab_id = order
                .laboratory_id
                .as_deref()
                .ok_or(CoreError::LaboratoryRequired)?;
            self.active_laboratory(&mut tx, lab_id).await?;
        }

        self.db
            .orders()
            .update_status(&mut *tx, id, order.status, request.status)
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %id,
            from = order.status.as_str(),
            to = request.status.as_str(),
            employee_id = %request.employee_id,
            "Order status updated"
        );

        self.get(id).await
    }

    /// Sets or clears the laboratory. Only active laboratories are accepted.
    pub async fn assign_laboratory(&self, id: &str, request: AssignLaboratory) -> ApiResult<Order> {
        let mut tx = self.db.begin().await?;
        let order = self.load(&mut tx, id).await?;
        if order.status.is_terminal() {
            return Err(ApiError::business_rule(format!(
                "Order {} is {}",
                order.order_number,
                order.status.as_str()
            )));
        }

        let lab_id = request.laboratory_id.as_deref();
        match lab_id {
            Some(lab_id) => {
                self.active_laboratory(&mut tx, lab_id).await?;
            }
            // Sent to a lab means it has one
            None if order.status == OrderStatus::InLaboratory => {
                return Err(CoreError::LaboratoryRequired.into());
            }
            None => {}
        }

        self.db
            .orders()
            .assign_laboratory(&mut *tx, id, lab_id)
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %id, laboratory_id = ?lab_id, "Order laboratory assigned");

        self.get(id).await
    }

    /// Cancels the order and every live payment on it, in one transaction.
    ///
    /// Fails as a whole when a completed payment sits in a closed register.
    pub async fn cancel(&self, id: &str, request: CancelOrder) -> ApiResult<Order> {
        validate_required_text("reason", &request.reason, 500)?;
        validate_required_text("cancelled_by", &request.cancelled_by, 64)?;

        let mut tx = self.db.begin().await?;
        let order = self.load(&mut tx, id).await?;
        ensure_order_transition(order.status, OrderStatus::Cancelled)?;

        let live: Vec<Payment> = self
            .db
            .payments()
            .list_for_order(&mut *tx, id)
            .await?
            .into_iter()
            .filter(|p| matches!(p.status, PaymentStatus::Completed | PaymentStatus::Pending))
            .collect();

        let payments = PaymentService::new(self.db.clone());
        let reason = format!("Order {} cancelled: {}", order.order_number, request.reason.trim());
        for payment in &live {
            payments
                .cancel_in(&mut tx, payment, &reason, &request.cancelled_by)
                .await?;
        }

        self.db
            .orders()
            .update_status(&mut *tx, id, order.status, OrderStatus::Cancelled)
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %id,
            order_number = %order.order_number,
            cancelled_payments = live.len(),
            cancelled_by = %request.cancelled_by,
            "Order cancelled"
        );

        self.get(id).await
    }

    /// Payment history of an order, oldest first.
    pub async fn payments(&self, id: &str) -> ApiResult<Vec<Payment>> {
        self.get(id).await?;
        Ok(self.db.payments().list_for_order(self.db.pool(), id).await?)
    }

    async fn load(&self, conn: &mut SqliteConnection, id: &str) -> ApiResult<Order> {
        self.db
            .orders()
            .fetch(&mut *conn, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Order not found: {id}")))
    }

    async fn active_laboratory(
        &self,
        conn: &mut SqliteConnection,
        laboratory_id: &str,
    ) -> ApiResult<Laboratory> {
        let lab = self
            .db
            .laboratories()
            .fetch(&mut *conn, laboratory_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Laboratory", laboratory_id))?;
        if !lab.is_active {
            return Err(CoreError::LaboratoryInactive {
                laboratory_id: lab.id,
            }
            .into());
        }
        Ok(lab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::laboratory_service::LaboratoryService;
    use crate::services::test_support::*;
    use optica_core::{LaboratoryInput, NewOrderItem, OrderPaymentStatus, PaymentMethod};
    use optica_db::DbConfig;

    fn lab_input(name: &str) -> LaboratoryInput {
        LaboratoryInput {
            name: name.to_string(),
            contact_name: None,
            email: None,
            phone: None,
            street: None,
            city: Some("Rosario".to_string()),
            province: None,
            postal_code: None,
            notes: None,
        }
    }

    fn status(to: OrderStatus) -> UpdateOrderStatus {
        UpdateOrderStatus {
            status: to,
            employee_id: "emp-1".to_string(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_create_computes_totals() {
        let db = test_db().await;
        let service = OrderService::new(db);

        let mut new = new_order(30_000);
        new.items.push(NewOrderItem {
            product_name: "Cristal orgánico".to_string(),
            description: Some("Antirreflejo".to_string()),
            quantity: 2,
            unit_price_cents: 12_500,
        });
        new.discount_cents = 5_000;

        let order = service.create(new).await.unwrap();
        assert_eq!(order.subtotal_cents, 55_000);
        assert_eq!(order.total_cents, 50_000);
        assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
        assert_eq!(order.status, OrderStatus::Pending);

        let fetched = service.get(&order.id).await.unwrap();
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(fetched.items[1].line_total_cents, 25_000);
        assert_eq!(fetched.order_number, order.order_number);
    }

    #[tokio::test]
    async fn test_laboratory_required_for_in_laboratory() {
        let db = test_db().await;
        let service = OrderService::new(db.clone());
        let order = create_order(&db, 10_000).await;

        let err = service
            .update_status(&order.id, status(OrderStatus::InLaboratory))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        let lab = LaboratoryService::new(db.clone())
            .create(lab_input("Laboratorio Central"))
            .await
            .unwrap();
        service
            .assign_laboratory(
                &order.id,
                AssignLaboratory {
                    laboratory_id: Some(lab.id.clone()),
                },
            )
            .await
            .unwrap();

        let order = service
            .update_status(&order.id, status(OrderStatus::InLaboratory))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::InLaboratory);
        assert_eq!(order.laboratory_id.as_deref(), Some(lab.id.as_str()));
    }

    #[tokio::test]
    async fn test_inactive_laboratory_rejected() {
        let db = test_db().await;
        let labs = LaboratoryService::new(db.clone());
        let lab = labs.create(lab_input("Óptica Sur")).await.unwrap();
        labs.set_active(&lab.id, false).await.unwrap();

        let err = OrderService::new(db.clone())
            .create(NewOrder {
                laboratory_id: Some(lab.id),
                ..new_order(10_000)
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
        assert!(err.message.contains("inactive"));
    }

    #[tokio::test]
    async fn test_delivery_flow() {
        let db = test_db().await;
        let service = OrderService::new(db.clone());
        let order = create_order(&db, 10_000).await;

        // Cannot skip ready
        assert!(service
            .update_status(&order.id, status(OrderStatus::Delivered))
            .await
            .is_err());

        service
            .update_status(&order.id, status(OrderStatus::Ready))
            .await
            .unwrap();
        let delivered = service
            .update_status(&order.id, status(OrderStatus::Delivered))
            .await
            .unwrap();
        assert!(delivered.delivered_at.is_some());

        // Delivered is terminal
        let err = service
            .cancel(
                &order.id,
                CancelOrder {
                    reason: "late".to_string(),
                    cancelled_by: "emp-1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_payments() {
        let db = test_db().await;
        let register_id = open_register(&db, 0).await;
        let order = create_order(&db, 40_000).await;
        let payments = PaymentService::new(db.clone());

        payments
            .create(order_payment(&order.id, PaymentMethod::Cash, 15_000))
            .await
            .unwrap();
        payments
            .create(order_payment(&order.id, PaymentMethod::DebitCard, 5_000))
            .await
            .unwrap();

        let cancelled = OrderService::new(db.clone())
            .update_status(
                &order.id,
                UpdateOrderStatus {
                    status: OrderStatus::Cancelled,
                    employee_id: "emp-3".to_string(),
                    reason: Some("Cliente desistió".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.paid_cents, 0);

        let history = OrderService::new(db.clone()).payments(&order.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|p| p.status == PaymentStatus::Cancelled));
        assert!(history[0]
            .cancel_reason
            .as_deref()
            .unwrap()
            .contains("Cliente desistió"));

        let register = db.cash_registers().fetch(db.pool(), &register_id).await.unwrap().unwrap();
        assert!(register.totals.is_zero());

        // No new money on a cancelled order
        let err = payments
            .create(order_payment(&order.id, PaymentMethod::Cash, 1_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_cancel_is_all_or_nothing_when_a_register_closed() {
        let db = test_db().await;
        let order = create_order(&db, 20_000).await;
        let payments = PaymentService::new(db.clone());

        // Pending transfer comes first and could be cancelled on its own
        let pending = payments
            .create_from_gateway(
                order_payment(&order.id, PaymentMethod::MercadoPago, 3_000),
                "mp-77",
                PaymentStatus::Pending,
            )
            .await
            .unwrap();

        let register_id = open_register(&db, 0).await;
        payments
            .create(order_payment(&order.id, PaymentMethod::Cash, 5_000))
            .await
            .unwrap();
        close_register(&db, &register_id, 5_000).await;

        let err = OrderService::new(db.clone())
            .cancel(
                &order.id,
                CancelOrder {
                    reason: "Error de carga".to_string(),
                    cancelled_by: "emp-2".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
        assert!(err.message.contains("closed"));

        let order = OrderService::new(db.clone()).get(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.paid_cents, 5_000);
        let pending = payments.get(&pending.id).await.unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_amounts_that_overflow() {
        let db = test_db().await;
        let service = OrderService::new(db);

        let mut new = new_order(1_000);
        new.items[0].quantity = 2;
        new.items[0].unit_price_cents = i64::MAX / 2 + 1;
        let err = service.create(new).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // Largest accepted order total
        let mut new = new_order(optica_core::MAX_PRICE_CENTS);
        new.items[0].quantity = 100;
        let order = service.create(new).await.unwrap();
        assert_eq!(order.total_cents, optica_core::MAX_AMOUNT_CENTS);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_numbers() {
        let path = std::env::temp_dir().join(format!("optica-orders-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let service = OrderService::new(db.clone());

        let creates = (0..8).map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.create(new_order(1_000 + i)).await })
        });
        let mut numbers = Vec::new();
        for handle in creates.collect::<Vec<_>>() {
            numbers.push(handle.await.unwrap().unwrap().order_number);
        }

        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 8);
        assert!(numbers.iter().any(|n| n.ends_with("-0008")));

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
