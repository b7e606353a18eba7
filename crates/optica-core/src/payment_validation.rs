//! # Payment Validation
//!
//! Business preconditions checked before a payment is booked or cancelled.
//! The functions work on snapshots loaded by the caller and never touch
//! storage, so the same checks run in services and in tests.
//!
//! ## Create Flow
//! ```text
//! NewPayment
//!    │
//!    ├── validate_new_payment()      shape: amount, kind/target, method
//!    ├── ensure_register_open()      a till session must be open
//!    ├── validate_order_payment()    order_payment: not cancelled, ≤ balance
//!    └── validate_debt_payment()     debt_payment: ≤ current debt
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::payment_status::ensure_payment_transition;
use crate::types::{
    CashRegister, LegacyClient, NewPayment, Order, Payment, PaymentDirection, PaymentKind,
    PaymentMethod, PaymentStatus,
};
use crate::validation::{
    validate_check, validate_installments, validate_optional_text, validate_payment_amount,
    validate_required_text,
};

/// Validates the shape of a new payment.
///
/// ## Rules
/// - amount > 0
/// - `order_payment` needs `order_id`, `debt_payment` needs
///   `legacy_client_id`; other kinds carry neither
/// - outgoing payments use cash or bank transfer
/// - check details present iff method is `check`
/// - installments only on credit card
pub fn validate_new_payment(payment: &NewPayment) -> CoreResult<()> {
    validate_payment_amount(payment.amount_cents)?;
    validate_required_text("employee_id", &payment.employee_id, 64)?;
    validate_optional_text("reference", payment.reference.as_deref(), 120)?;
    validate_optional_text("notes", payment.notes.as_deref(), 1000)?;

    match payment.kind {
        PaymentKind::OrderPayment => {
            if payment.order_id.is_none() {
                return Err(CoreError::not_allowed("order payments need an order_id"));
            }
            if payment.legacy_client_id.is_some() {
                return Err(CoreError::not_allowed(
                    "order payments cannot reference a legacy client",
                ));
            }
        }
        PaymentKind::DebtPayment => {
            if payment.legacy_client_id.is_none() {
                return Err(CoreError::not_allowed(
                    "debt payments need a legacy_client_id",
                ));
            }
            if payment.order_id.is_some() {
                return Err(CoreError::not_allowed(
                    "debt payments cannot reference an order",
                ));
            }
        }
        PaymentKind::Income | PaymentKind::Expense | PaymentKind::Withdrawal => {
            if payment.order_id.is_some() || payment.legacy_client_id.is_some() {
                return Err(CoreError::not_allowed(format!(
                    "{} payments cannot reference an order or client",
                    payment.kind.as_str()
                )));
            }
        }
    }

    if payment.kind.direction() == PaymentDirection::Outgoing
        && !matches!(payment.method, PaymentMethod::Cash | PaymentMethod::BankTransfer)
    {
        return Err(CoreError::not_allowed(format!(
            "{} payments must use cash or bank_transfer, got {}",
            payment.kind.as_str(),
            payment.method.as_str()
        )));
    }

    match (&payment.check, payment.method) {
        (Some(check), PaymentMethod::Check) => validate_check(check)?,
        (None, PaymentMethod::Check) => {
            return Err(CoreError::not_allowed("check payments need check details"));
        }
        (Some(_), _) => {
            return Err(CoreError::not_allowed(
                "check details are only allowed on check payments",
            ));
        }
        (None, _) => {}
    }

    if let Some(installments) = &payment.installments {
        if payment.method != PaymentMethod::CreditCard {
            return Err(CoreError::not_allowed(
                "installments are only allowed on credit card payments",
            ));
        }
        validate_installments(installments.count, installments.interest_bps)?;
    }

    Ok(())
}

/// Returns the open register or `NoOpenRegister`.
pub fn ensure_register_open(register: Option<&CashRegister>) -> CoreResult<&CashRegister> {
    match register {
        Some(register) if register.is_open() => Ok(register),
        Some(register) => Err(CoreError::RegisterClosed {
            register_id: register.id.clone(),
        }),
        None => Err(CoreError::NoOpenRegister),
    }
}

/// Checks that an order can take `amount` more.
pub fn validate_order_payment(order: &Order, amount: Money) -> CoreResult<()> {
    if order.is_cancelled() {
        return Err(CoreError::OrderCancelled {
            order_id: order.id.clone(),
        });
    }

    let balance = order.balance();
    if amount > balance {
        return Err(CoreError::AmountExceedsBalance {
            balance,
            requested: amount,
        });
    }

    Ok(())
}

/// Checks that a legacy client owes at least `amount`.
pub fn validate_debt_payment(client: &LegacyClient, amount: Money) -> CoreResult<()> {
    let debt = client.current_debt();
    if amount > debt {
        return Err(CoreError::AmountExceedsDebt {
            debt,
            requested: amount,
        });
    }

    Ok(())
}

/// Checks that a payment may be cancelled.
///
/// Completed payments need their register to still be open, since the
/// reversal is applied to its totals. Pending payments never touched a
/// register and can be cancelled at any time.
pub fn ensure_cancellable(payment: &Payment, register: Option<&CashRegister>) -> CoreResult<()> {
    ensure_payment_transition(payment.status, PaymentStatus::Cancelled)?;

    if payment.status == PaymentStatus::Pending {
        return Ok(());
    }

    let register_id = payment
        .register_id
        .as_deref()
        .ok_or(CoreError::NoOpenRegister)?;

    match register {
        Some(register) if register.id == register_id && register.is_open() => Ok(()),
        _ => Err(CoreError::RegisterClosed {
            register_id: register_id.to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        InstallmentRequest, NewCheck, OrderPaymentStatus, OrderStatus, RegisterStatus,
        RegisterTotals,
    };
    use chrono::{NaiveDate, Utc};

    fn new_payment(kind: PaymentKind, method: PaymentMethod) -> NewPayment {
        NewPayment {
            kind,
            method,
            amount_cents: 5_000,
            order_id: (kind == PaymentKind::OrderPayment).then(|| "order-1".to_string()),
            legacy_client_id: (kind == PaymentKind::DebtPayment).then(|| "client-1".to_string()),
            employee_id: "emp-1".to_string(),
            reference: None,
            notes: None,
            check: (method == PaymentMethod::Check).then(|| NewCheck {
                bank: "Santander".to_string(),
                check_number: "778899".to_string(),
                issuer: Some("Óptica Norte SRL".to_string()),
                due_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            }),
            installments: None,
        }
    }

    fn register(status: RegisterStatus) -> CashRegister {
        CashRegister {
            id: "reg-1".to_string(),
            status,
            opened_by: "emp-1".to_string(),
            opened_at: Utc::now(),
            opening_balance_cents: 0,
            totals: RegisterTotals::default(),
            closed_by: None,
            closed_at: None,
            closing_balance_cents: None,
            expected_balance_cents: None,
            difference_cents: None,
            notes: None,
        }
    }

    fn order(status: OrderStatus, total: i64, paid: i64) -> Order {
        let now = Utc::now();
        Order {
            id: "order-1".to_string(),
            order_number: "ORD-261019-0001".to_string(),
            client_name: "Lucía".to_string(),
            client_phone: None,
            client_document: None,
            employee_id: "emp-1".to_string(),
            laboratory_id: None,
            status,
            payment_status: OrderPaymentStatus::Pending,
            subtotal_cents: total,
            discount_cents: 0,
            total_cents: total,
            paid_cents: paid,
            notes: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_valid_payments() {
        for kind in PaymentKind::ALL {
            assert!(validate_new_payment(&new_payment(kind, PaymentMethod::Cash)).is_ok());
        }
        assert!(
            validate_new_payment(&new_payment(PaymentKind::OrderPayment, PaymentMethod::Check))
                .is_ok()
        );
    }

    #[test]
    fn test_amount_must_be_positive() {
        let mut payment = new_payment(PaymentKind::Income, PaymentMethod::Cash);
        payment.amount_cents = 0;
        assert!(matches!(
            validate_new_payment(&payment),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_kind_target_consistency() {
        let mut payment = new_payment(PaymentKind::OrderPayment, PaymentMethod::Cash);
        payment.order_id = None;
        assert!(validate_new_payment(&payment).is_err());

        let mut payment = new_payment(PaymentKind::Expense, PaymentMethod::Cash);
        payment.order_id = Some("order-1".to_string());
        assert!(validate_new_payment(&payment).is_err());

        let mut payment = new_payment(PaymentKind::DebtPayment, PaymentMethod::Cash);
        payment.order_id = Some("order-1".to_string());
        assert!(validate_new_payment(&payment).is_err());
    }

    #[test]
    fn test_outgoing_methods() {
        assert!(
            validate_new_payment(&new_payment(PaymentKind::Expense, PaymentMethod::BankTransfer))
                .is_ok()
        );
        assert!(
            validate_new_payment(&new_payment(PaymentKind::Withdrawal, PaymentMethod::CreditCard))
                .is_err()
        );
    }

    #[test]
    fn test_check_details_iff_check() {
        let mut payment = new_payment(PaymentKind::OrderPayment, PaymentMethod::Check);
        payment.check = None;
        assert!(validate_new_payment(&payment).is_err());

        let mut payment = new_payment(PaymentKind::OrderPayment, PaymentMethod::Check);
        payment.method = PaymentMethod::Cash;
        assert!(validate_new_payment(&payment).is_err());
    }

    #[test]
    fn test_installments_only_credit_card() {
        let mut payment = new_payment(PaymentKind::OrderPayment, PaymentMethod::CreditCard);
        payment.installments = Some(InstallmentRequest {
            count: 6,
            interest_bps: 1_500,
        });
        assert!(validate_new_payment(&payment).is_ok());

        payment.method = PaymentMethod::DebitCard;
        assert!(validate_new_payment(&payment).is_err());

        payment.method = PaymentMethod::CreditCard;
        payment.installments = Some(InstallmentRequest {
            count: 30,
            interest_bps: 0,
        });
        assert!(validate_new_payment(&payment).is_err());
    }

    #[test]
    fn test_ensure_register_open() {
        assert!(matches!(
            ensure_register_open(None),
            Err(CoreError::NoOpenRegister)
        ));
        let closed = register(RegisterStatus::Closed);
        assert!(matches!(
            ensure_register_open(Some(&closed)),
            Err(CoreError::RegisterClosed { .. })
        ));
        let open = register(RegisterStatus::Open);
        assert_eq!(ensure_register_open(Some(&open)).unwrap().id, "reg-1");
    }

    #[test]
    fn test_validate_order_payment() {
        let open_order = order(OrderStatus::Ready, 10_000, 4_000);
        assert!(validate_order_payment(&open_order, Money::from_cents(6_000)).is_ok());
        assert!(matches!(
            validate_order_payment(&open_order, Money::from_cents(6_001)),
            Err(CoreError::AmountExceedsBalance { .. })
        ));

        let cancelled = order(OrderStatus::Cancelled, 10_000, 0);
        assert!(matches!(
            validate_order_payment(&cancelled, Money::from_cents(100)),
            Err(CoreError::OrderCancelled { .. })
        ));
    }

    #[test]
    fn test_validate_debt_payment() {
        let now = Utc::now();
        let client = LegacyClient {
            id: "client-1".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Ruiz".to_string(),
            document_number: "28999111".to_string(),
            phone: None,
            email: None,
            initial_debt_cents: 20_000,
            current_debt_cents: 7_500,
            last_payment_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        assert!(validate_debt_payment(&client, Money::from_cents(7_500)).is_ok());
        assert!(matches!(
            validate_debt_payment(&client, Money::from_cents(7_501)),
            Err(CoreError::AmountExceedsDebt { .. })
        ));
    }

    #[test]
    fn test_ensure_cancellable() {
        let now = Utc::now();
        let mut payment = Payment {
            id: "pay-1".to_string(),
            register_id: Some("reg-1".to_string()),
            kind: PaymentKind::Income,
            method: PaymentMethod::Cash,
            status: PaymentStatus::Completed,
            amount_cents: 1_000,
            order_id: None,
            legacy_client_id: None,
            employee_id: "emp-1".to_string(),
            reference: None,
            notes: None,
            gateway_payment_id: None,
            check: None,
            installments: None,
            cancel_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        let open = register(RegisterStatus::Open);
        let closed = register(RegisterStatus::Closed);

        assert!(ensure_cancellable(&payment, Some(&open)).is_ok());
        assert!(matches!(
            ensure_cancellable(&payment, Some(&closed)),
            Err(CoreError::RegisterClosed { .. })
        ));

        payment.status = PaymentStatus::Pending;
        payment.register_id = None;
        assert!(ensure_cancellable(&payment, None).is_ok());

        payment.status = PaymentStatus::Cancelled;
        assert!(matches!(
            ensure_cancellable(&payment, Some(&open)),
            Err(CoreError::InvalidPaymentTransition { .. })
        ));
    }
}
