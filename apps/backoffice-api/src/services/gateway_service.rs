//! Mercado Pago reconciliation.
//!
//! Webhooks only say "payment X changed". The service reads the payment
//! back from the gateway and brings the local record in line:
//!
//! ```text
//! gateway status          local payment     action
//! ──────────────────────  ────────────────  ─────────────────────────────
//! approved                none              create completed (open register)
//! approved                pending           complete in the open register
//! approved                cancelled/rejected acknowledge, manual refund
//! approved                completed         nothing
//! pending/in_process/...  none              create pending (no register)
//! rejected/cancelled      pending           mark rejected / cancelled
//! refunded/charged_back   completed         cancel with reversal
//! anything else                             acknowledge
//! ```
//!
//! An approved payment the order can no longer take (cancelled, or paid at
//! the counter meanwhile) is acknowledged and logged for a manual refund.
//! So is a refund whose register is already closed.
//!
//! Every branch is idempotent so gateway retries are harmless.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use optica_core::{
    GatewayStatus, Money, NewPayment, Order, Payment, PaymentKind, PaymentMethod, PaymentStatus,
};
use optica_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::gateway::{GatewayError, GatewayPayment, PaymentGateway, Preference};
use crate::services::payment_service::{CancelPayment, PaymentService};

/// Actor recorded on payments the gateway creates or cancels.
const GATEWAY_ACTOR: &str = "mercadopago";

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created { payment_id: String, status: PaymentStatus },
    Completed { payment_id: String },
    Failed { payment_id: String, status: PaymentStatus },
    Reversed { payment_id: String },
    Unchanged { payment_id: String },
    /// Acknowledged without touching local state.
    Ignored { reason: String },
}

#[derive(Clone)]
pub struct GatewayService {
    db: Database,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl GatewayService {
    pub fn new(db: Database, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        GatewayService { db, gateway }
    }

    fn gateway(&self) -> ApiResult<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| GatewayError::NotConfigured.into())
    }

    fn payments(&self) -> PaymentService {
        PaymentService::new(self.db.clone())
    }

    /// Creates a checkout preference for what is left to pay on an order.
    pub async fn create_preference_for_order(&self, order_id: &str) -> ApiResult<Preference> {
        let gateway = self.gateway()?;
        let order = self
            .db
            .orders()
            .fetch(self.db.pool(), order_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Order not found: {order_id}")))?;

        if order.is_cancelled() {
            return Err(ApiError::business_rule(format!(
                "Order {} is cancelled",
                order.order_number
            )));
        }
        let balance = order.balance();
        if !balance.is_positive() {
            return Err(ApiError::business_rule(format!(
                "Order {} has nothing left to pay",
                order.order_number
            )));
        }

        Ok(gateway.create_preference(&order, balance).await?)
    }

    /// Brings the local record of a gateway payment in line with the gateway.
    pub async fn reconcile(&self, gateway_payment_id: &str) -> ApiResult<ReconcileOutcome> {
        let remote = self.gateway()?.fetch_payment(gateway_payment_id).await?;
        let local = self
            .db
            .payments()
            .fetch_by_gateway_id(self.db.pool(), &remote.id)
            .await?;

        info!(
            gateway_payment_id = %remote.id,
            status = remote.status.as_str(),
            amount = %remote.amount,
            local_payment_id = ?local.as_ref().map(|p| p.id.as_str()),
            "Reconciling Mercado Pago payment"
        );

        let outcome = match (&remote.status, local) {
            (GatewayStatus::Approved, None) => self.book(&remote, PaymentStatus::Completed).await?,
            (GatewayStatus::Approved, Some(local)) if local.status == PaymentStatus::Pending => {
                self.complete(&remote, local).await?
            }
            (GatewayStatus::Approved, Some(local))
                if matches!(local.status, PaymentStatus::Cancelled | PaymentStatus::Rejected) =>
            {
                warn!(
                    gateway_payment_id = %remote.id,
                    payment_id = %local.id,
                    local_status = local.status.as_str(),
                    amount = %remote.amount,
                    "Mercado Pago approved a payment closed locally; needs manual refund"
                );
                ReconcileOutcome::Ignored {
                    reason: format!("payment {} is {} locally", local.id, local.status.as_str()),
                }
            }
            (status, None) if status.is_pending() => {
                self.book(&remote, PaymentStatus::Pending).await?
            }
            (status, Some(local)) if local.status == PaymentStatus::Pending => {
                match status.failure_status().or_else(|| {
                    status.is_reversal().then_some(PaymentStatus::Cancelled)
                }) {
                    Some(to) => {
                        let reason = format!("Mercado Pago payment {}", status.as_str());
                        self.payments()
                            .fail_pending(&local.id, to, &reason, GATEWAY_ACTOR)
                            .await?;
                        ReconcileOutcome::Failed {
                            payment_id: local.id,
                            status: to,
                        }
                    }
                    None => ReconcileOutcome::Unchanged {
                        payment_id: local.id,
                    },
                }
            }
            (status, Some(local))
                if status.is_reversal() && local.status == PaymentStatus::Completed =>
            {
                self.reverse(&remote, local.id).await?
            }
            (GatewayStatus::Unknown(raw), _) => {
                warn!(gateway_payment_id = %remote.id, status = %raw, "Unknown Mercado Pago status");
                ReconcileOutcome::Ignored {
                    reason: format!("unknown status {raw}"),
                }
            }
            (_, Some(local)) => ReconcileOutcome::Unchanged {
                payment_id: local.id,
            },
            (status, None) => ReconcileOutcome::Ignored {
                reason: format!("no local payment for a {} payment", status.as_str()),
            },
        };

        info!(gateway_payment_id = %remote.id, outcome = ?outcome, "Mercado Pago payment reconciled");
        Ok(outcome)
    }

    /// Records a gateway payment that has no local counterpart yet.
    async fn book(
        &self,
        remote: &GatewayPayment,
        status: PaymentStatus,
    ) -> ApiResult<ReconcileOutcome> {
        let Some(order) = self.order_for(remote).await? else {
            warn!(
                gateway_payment_id = %remote.id,
                external_reference = ?remote.external_reference,
                "Mercado Pago payment does not reference a known order"
            );
            return Ok(ReconcileOutcome::Ignored {
                reason: "unknown order reference".to_string(),
            });
        };

        if let Some(ignored) = misfit(remote, &order, remote.amount) {
            return Ok(ignored);
        }

        if status == PaymentStatus::Completed {
            self.require_open_register().await?;
        }

        let new = NewPayment {
            kind: PaymentKind::OrderPayment,
            method: PaymentMethod::MercadoPago,
            amount_cents: remote.amount.cents(),
            order_id: Some(order.id.clone()),
            legacy_client_id: None,
            employee_id: GATEWAY_ACTOR.to_string(),
            reference: Some(remote.id.clone()),
            notes: None,
            check: None,
            installments: None,
        };
        let payment = self
            .payments()
            .create_from_gateway(new, &remote.id, status)
            .await?;

        Ok(ReconcileOutcome::Created {
            payment_id: payment.id,
            status: payment.status,
        })
    }

    /// Approval of a payment first reported as pending. The order may have
    /// been paid at the counter or cancelled in between.
    async fn complete(
        &self,
        remote: &GatewayPayment,
        local: Payment,
    ) -> ApiResult<ReconcileOutcome> {
        if let Some(order_id) = local.order_id.as_deref() {
            if let Some(order) = self.db.orders().fetch(self.db.pool(), order_id).await? {
                if let Some(ignored) = misfit(remote, &order, local.amount()) {
                    return Ok(ignored);
                }
            }
        }

        self.require_open_register().await?;
        self.payments().complete_pending(&local.id).await?;
        Ok(ReconcileOutcome::Completed {
            payment_id: local.id,
        })
    }

    /// Refund or chargeback of a completed payment.
    async fn reverse(
        &self,
        remote: &GatewayPayment,
        payment_id: String,
    ) -> ApiResult<ReconcileOutcome> {
        let payment = self.payments().get(&payment_id).await?;
        let register = match payment.register_id.as_deref() {
            Some(id) => self.db.cash_registers().fetch(self.db.pool(), id).await?,
            None => None,
        };

        if !register.as_ref().is_some_and(|r| r.is_open()) {
            warn!(
                gateway_payment_id = %remote.id,
                payment_id = %payment_id,
                register_id = ?payment.register_id,
                "Mercado Pago {} on a closed register; left for manual handling",
                remote.status.as_str()
            );
            return Ok(ReconcileOutcome::Ignored {
                reason: format!("{} on a closed register", remote.status.as_str()),
            });
        }

        self.payments()
            .cancel(
                &payment_id,
                CancelPayment {
                    reason: format!("Mercado Pago payment {}", remote.status.as_str()),
                    cancelled_by: GATEWAY_ACTOR.to_string(),
                },
            )
            .await?;

        Ok(ReconcileOutcome::Reversed { payment_id })
    }

    async fn order_for(&self, remote: &GatewayPayment) -> ApiResult<Option<Order>> {
        match remote.external_reference.as_deref() {
            Some(order_id) => Ok(self.db.orders().fetch(self.db.pool(), order_id).await?),
            None => Ok(None),
        }
    }

    /// 503 so the gateway retries once a register is open.
    async fn require_open_register(&self) -> ApiResult<()> {
        if self
            .db
            .cash_registers()
            .fetch_open(self.db.pool())
            .await?
            .is_none()
        {
            return Err(ApiError::service_unavailable(
                "No cash register is open to receive the payment",
            ));
        }
        Ok(())
    }
}

/// Money arrived but the order can no longer take it: a person has to
/// refund it from the Mercado Pago dashboard.
fn misfit(remote: &GatewayPayment, order: &Order, amount: Money) -> Option<ReconcileOutcome> {
    if !order.is_cancelled() && amount <= order.balance() {
        return None;
    }

    warn!(
        gateway_payment_id = %remote.id,
        order_id = %order.id,
        order_status = order.status.as_str(),
        balance = %order.balance(),
        amount = %amount,
        "Mercado Pago payment does not fit the order; needs manual refund"
    );
    Some(ReconcileOutcome::Ignored {
        reason: format!("payment does not fit order {}", order.order_number),
    })
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use optica_core::payment_status::gateway_status;
    use optica_core::{Money, Order};

    use crate::gateway::{
        GatewayError, GatewayPayment, GatewayResult, PaymentGateway, Preference,
    };

    /// In-process gateway holding payments by id.
    #[derive(Default)]
    pub struct FakeGateway {
        payments: Mutex<HashMap<String, GatewayPayment>>,
    }

    impl FakeGateway {
        pub fn set_payment(&self, id: &str, status: &str, order_id: Option<&str>, cents: i64) {
            let payment = GatewayPayment {
                id: id.to_string(),
                status: gateway_status(status),
                external_reference: order_id.map(str::to_string),
                amount: Money::from_cents(cents),
            };
            self.payments
                .lock()
                .unwrap()
                .insert(id.to_string(), payment);
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_preference(&self, order: &Order, amount: Money) -> GatewayResult<Preference> {
            Ok(Preference {
                id: format!("pref-{}", order.id),
                init_point: format!("https://mp.test/checkout/{}", order.id),
                sandbox_init_point: None,
                amount,
            })
        }

        async fn fetch_payment(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPayment> {
            self.payments
                .lock()
                .unwrap()
                .get(gateway_payment_id)
                .cloned()
                .ok_or(GatewayError::Status {
                    status: 404,
                    body: "not found".to_string(),
                })
        }
    }
}
