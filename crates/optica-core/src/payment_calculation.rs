//! # Payment Calculation
//!
//! How payments move register totals, and how those totals are rebuilt and
//! checked at the end of the day.
//!
//! ## Register Delta
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kind            │ effect on RegisterTotals                              │
//! │  ────────────────┼─────────────────────────────────────────────────────  │
//! │  order_payment   │ sales[method] += amount, total_sales += amount        │
//! │  debt_payment    │ payments_received += amount                           │
//! │  income          │ payments_received += amount                           │
//! │  expense         │ payments_made += amount                               │
//! │  withdrawal      │ payments_made += amount                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Booking a payment applies its delta; cancelling applies the negated
//! delta. Recomputing from the till-affecting payments must land on the
//! same totals, which is what [`summarize`] checks.

use crate::error::CoreResult;
use crate::money::{Money, Rate};
use crate::types::{
    CashRegister, InstallmentPlan, KindTotal, Order, Payment, PaymentDirection, PaymentKind,
    PaymentMethod, PaymentStatus, RegisterSummary, RegisterTotals,
};
use crate::validation::{validate_installments, validate_payment_amount};

// =============================================================================
// Register Totals
// =============================================================================

/// The change one completed payment applies to its register.
///
/// ```rust
/// use optica_core::money::Money;
/// use optica_core::payment_calculation::register_delta;
/// use optica_core::types::{PaymentKind, PaymentMethod};
///
/// let delta = register_delta(PaymentKind::OrderPayment, PaymentMethod::DebitCard, Money::from_cents(5000));
/// assert_eq!(delta.sales.debit_card.cents(), 5000);
/// assert_eq!(delta.total_sales.cents(), 5000);
/// ```
pub fn register_delta(kind: PaymentKind, method: PaymentMethod, amount: Money) -> RegisterTotals {
    let mut delta = RegisterTotals::default();
    match kind {
        PaymentKind::OrderPayment => {
            *delta.sales.get_mut(method) += amount;
            delta.total_sales += amount;
        }
        PaymentKind::DebtPayment | PaymentKind::Income => {
            delta.payments_received += amount;
        }
        PaymentKind::Expense | PaymentKind::Withdrawal => {
            delta.payments_made += amount;
        }
    }
    delta
}

/// Delta of an existing payment.
pub fn payment_delta(payment: &Payment) -> RegisterTotals {
    register_delta(payment.kind, payment.method, payment.amount())
}

/// Recomputes register totals from its till-affecting payments.
pub fn totals_from_payments(payments: &[Payment]) -> RegisterTotals {
    let mut totals = RegisterTotals::default();
    for payment in payments.iter().filter(|p| p.is_till_affecting()) {
        totals.apply(&payment_delta(payment));
    }
    totals
}

/// Cash the till should hold: opening balance plus cash in, minus cash out.
pub fn expected_cash(opening: Money, payments: &[Payment]) -> Money {
    payments
        .iter()
        .filter(|p| p.is_till_affecting() && p.method == PaymentMethod::Cash)
        .fold(opening, |acc, p| match p.direction() {
            PaymentDirection::Incoming => acc + p.amount(),
            PaymentDirection::Outgoing => acc - p.amount(),
        })
}

// =============================================================================
// Installments & Balances
// =============================================================================

/// Builds a credit card installment plan.
///
/// `financed_total = amount + amount × interest` (half-up), and each
/// installment is rounded up so the installments cover the financed total.
pub fn installment_plan(amount: Money, count: u32, interest: Rate) -> CoreResult<InstallmentPlan> {
    validate_installments(count, interest.bps())?;
    validate_payment_amount(amount.cents())?;

    // Bounded amount and rate keep this well inside i64
    let financed_total = amount + amount.apply_rate(interest);
    let installment = financed_total.div_ceil(count).unwrap_or(financed_total);

    Ok(InstallmentPlan {
        count,
        interest_bps: interest.bps(),
        installment_cents: installment.cents(),
        financed_total_cents: financed_total.cents(),
    })
}

/// What is still owed on an order.
#[inline]
pub fn order_balance(order: &Order) -> Money {
    order.balance()
}

// =============================================================================
// Register Summary
// =============================================================================

/// Builds the end-of-day report for a register.
///
/// Payments belonging to other registers are ignored. Discrepancies are
/// listed when the running totals disagree with the recomputed ones.
pub fn summarize(register: &CashRegister, payments: &[Payment]) -> RegisterSummary {
    let own: Vec<&Payment> = payments
        .iter()
        .filter(|p| p.register_id.as_deref() == Some(register.id.as_str()))
        .collect();

    let mut recomputed = RegisterTotals::default();
    let mut by_kind: Vec<KindTotal> = PaymentKind::ALL
        .iter()
        .map(|kind| KindTotal {
            kind: *kind,
            count: 0,
            amount: Money::zero(),
        })
        .collect();
    let mut expected = register.opening_balance();
    let mut payment_count = 0u32;
    let mut cancelled_count = 0u32;

    for payment in &own {
        if payment.status == PaymentStatus::Cancelled {
            cancelled_count += 1;
        }
        if !payment.is_till_affecting() {
            continue;
        }
        payment_count += 1;
        recomputed.apply(&payment_delta(payment));

        if let Some(entry) = by_kind.iter_mut().find(|k| k.kind == payment.kind) {
            entry.count += 1;
            entry.amount += payment.amount();
        }

        if payment.method == PaymentMethod::Cash {
            match payment.direction() {
                PaymentDirection::Incoming => expected += payment.amount(),
                PaymentDirection::Outgoing => expected -= payment.amount(),
            }
        }
    }

    let discrepancies = find_discrepancies(&register.totals, &recomputed);

    RegisterSummary {
        register_id: register.id.clone(),
        status: register.status,
        opening_balance: register.opening_balance(),
        running_totals: register.totals,
        recomputed_totals: recomputed,
        by_kind,
        payment_count,
        cancelled_count,
        expected_cash: expected,
        discrepancies,
    }
}

fn find_discrepancies(running: &RegisterTotals, recomputed: &RegisterTotals) -> Vec<String> {
    let mut out = Vec::new();
    let mut compare = |label: &str, running: Money, recomputed: Money| {
        if running != recomputed {
            out.push(format!(
                "{label}: running {running}, recomputed {recomputed}"
            ));
        }
    };

    for method in PaymentMethod::ALL {
        compare(
            &format!("sales.{}", method.as_str()),
            running.sales.get(method),
            recomputed.sales.get(method),
        );
    }
    compare("total_sales", running.total_sales, recomputed.total_sales);
    compare(
        "payments_received",
        running.payments_received,
        recomputed.payments_received,
    );
    compare("payments_made", running.payments_made, recomputed.payments_made);

    if running.total_sales != running.sales.total() {
        out.push(format!(
            "total_sales {} does not match per-method sum {}",
            running.total_sales,
            running.sales.total()
        ));
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckDetails, CompensationStatus, RegisterStatus};
    use chrono::Utc;

    fn payment(
        kind: PaymentKind,
        method: PaymentMethod,
        status: PaymentStatus,
        amount: i64,
    ) -> Payment {
        let now = Utc::now();
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            register_id: Some("reg-1".to_string()),
            kind,
            method,
            status,
            amount_cents: amount,
            order_id: None,
            legacy_client_id: None,
            employee_id: "emp-1".to_string(),
            reference: None,
            notes: None,
            gateway_payment_id: None,
            check: (method == PaymentMethod::Check).then(|| CheckDetails {
                bank: "Galicia".to_string(),
                check_number: "123456".to_string(),
                issuer: None,
                due_date: now.date_naive(),
                compensation_status: if status == PaymentStatus::Rejected {
                    CompensationStatus::Rejected
                } else {
                    CompensationStatus::Pending
                },
                compensated_at: None,
            }),
            installments: None,
            cancel_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn register(opening: i64, totals: RegisterTotals) -> CashRegister {
        CashRegister {
            id: "reg-1".to_string(),
            status: RegisterStatus::Open,
            opened_by: "emp-1".to_string(),
            opened_at: Utc::now(),
            opening_balance_cents: opening,
            totals,
            closed_by: None,
            closed_at: None,
            closing_balance_cents: None,
            expected_balance_cents: None,
            difference_cents: None,
            notes: None,
        }
    }

    fn day() -> Vec<Payment> {
        use PaymentKind::*;
        use PaymentMethod::*;
        use PaymentStatus::*;
        vec![
            payment(OrderPayment, Cash, Completed, 10_000),
            payment(OrderPayment, CreditCard, Completed, 25_000),
            payment(OrderPayment, Check, Rejected, 8_000),
            payment(OrderPayment, Cash, Cancelled, 3_000),
            payment(DebtPayment, Cash, Completed, 2_000),
            payment(Income, BankTransfer, Completed, 1_500),
            payment(Expense, Cash, Completed, 700),
            payment(Withdrawal, Cash, Completed, 5_000),
            payment(OrderPayment, MercadoPago, Pending, 9_999),
        ]
    }

    #[test]
    fn test_register_delta_by_kind() {
        let amount = Money::from_cents(1000);

        let sale = register_delta(PaymentKind::OrderPayment, PaymentMethod::Cash, amount);
        assert_eq!(sale.sales.cash, amount);
        assert_eq!(sale.total_sales, amount);
        assert!(sale.payments_received.is_zero());

        let debt = register_delta(PaymentKind::DebtPayment, PaymentMethod::Cash, amount);
        assert!(debt.total_sales.is_zero());
        assert_eq!(debt.payments_received, amount);

        let expense = register_delta(PaymentKind::Expense, PaymentMethod::BankTransfer, amount);
        assert_eq!(expense.payments_made, amount);
        assert!(expense.sales.bank_transfer.is_zero());
    }

    #[test]
    fn test_totals_from_payments_counts_till_affecting_only() {
        let totals = totals_from_payments(&day());
        assert_eq!(totals.sales.cash.cents(), 10_000);
        assert_eq!(totals.sales.credit_card.cents(), 25_000);
        assert_eq!(totals.sales.check.cents(), 8_000);
        assert!(totals.sales.mercado_pago.is_zero());
        assert_eq!(totals.total_sales.cents(), 43_000);
        assert_eq!(totals.payments_received.cents(), 3_500);
        assert_eq!(totals.payments_made.cents(), 5_700);
    }

    #[test]
    fn test_expected_cash() {
        // 5000 + 10000 + 2000 - 700 - 5000
        assert_eq!(expected_cash(Money::from_cents(5_000), &day()).cents(), 11_300);
        assert_eq!(expected_cash(Money::from_cents(5_000), &[]).cents(), 5_000);
    }

    #[test]
    fn test_installment_plan() {
        let plan = installment_plan(Money::from_cents(10_000), 3, Rate::from_bps(1_000)).unwrap();
        assert_eq!(plan.financed_total_cents, 11_000);
        assert_eq!(plan.installment_cents, 3_667);
        assert_eq!(plan.count, 3);

        let flat = installment_plan(Money::from_cents(10_000), 1, Rate::zero()).unwrap();
        assert_eq!(flat.financed_total_cents, 10_000);
        assert_eq!(flat.installment_cents, 10_000);

        assert!(installment_plan(Money::from_cents(10_000), 0, Rate::zero()).is_err());
        assert!(installment_plan(Money::from_cents(10_000), 25, Rate::zero()).is_err());
        assert!(installment_plan(Money::from_cents(i64::MAX), 12, Rate::from_bps(10_000)).is_err());
    }

    #[test]
    fn test_summarize_reconciled() {
        let payments = day();
        let reg = register(5_000, totals_from_payments(&payments));

        let summary = summarize(&reg, &payments);
        assert!(summary.is_reconciled(), "{:?}", summary.discrepancies);
        assert_eq!(summary.payment_count, 7);
        assert_eq!(summary.cancelled_count, 1);
        assert_eq!(summary.expected_cash.cents(), 11_300);

        let orders = summary
            .by_kind
            .iter()
            .find(|k| k.kind == PaymentKind::OrderPayment)
            .unwrap();
        assert_eq!(orders.count, 3);
        assert_eq!(orders.amount.cents(), 43_000);
    }

    #[test]
    fn test_summarize_reports_discrepancies() {
        let payments = day();
        let mut totals = totals_from_payments(&payments);
        totals.sales.cash += Money::from_cents(100);
        totals.total_sales += Money::from_cents(100);

        let summary = summarize(&register(0, totals), &payments);
        assert_eq!(summary.discrepancies.len(), 2);
        assert!(summary.discrepancies[0].starts_with("sales.cash"));
    }

    #[test]
    fn test_summarize_ignores_other_registers() {
        let mut foreign = payment(
            PaymentKind::OrderPayment,
            PaymentMethod::Cash,
            PaymentStatus::Completed,
            4_000,
        );
        foreign.register_id = Some("reg-2".to_string());

        let summary = summarize(&register(0, RegisterTotals::default()), &[foreign]);
        assert!(summary.is_reconciled());
        assert_eq!(summary.payment_count, 0);
    }
}
