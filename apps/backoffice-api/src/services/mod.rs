//! Service layer.
//!
//! Services load snapshots through the repositories, run the pure rules
//! from `optica-core` over them and write the outcome back, one
//! transaction per operation. Handlers stay thin: parse, call a service,
//! serialize.

pub mod cash_register_service;
pub mod gateway_service;
pub mod laboratory_service;
pub mod legacy_client_service;
pub mod order_service;
pub mod payment_service;

#[cfg(test)]
pub(crate) mod test_support {
    use optica_core::{
        NewLegacyClient, NewOrder, NewOrderItem, NewPayment, Order, PaymentKind, PaymentMethod,
    };
    use optica_db::{Database, DbConfig};

    use super::cash_register_service::{CashRegisterService, CloseRegister, OpenRegister};
    use super::legacy_client_service::LegacyClientService;
    use super::order_service::OrderService;

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    pub async fn open_register(db: &Database, opening_cents: i64) -> String {
        CashRegisterService::new(db.clone())
            .open(OpenRegister {
                opening_balance_cents: opening_cents,
                opened_by: "emp-1".to_string(),
                notes: None,
            })
            .await
            .expect("open register")
            .id
    }

    pub async fn close_register(db: &Database, register_id: &str, counted_cents: i64) {
        CashRegisterService::new(db.clone())
            .close(
                register_id,
                CloseRegister {
                    counted_balance_cents: counted_cents,
                    closed_by: "emp-1".to_string(),
                    notes: None,
                },
            )
            .await
            .expect("close register");
    }

    pub fn new_order(total_cents: i64) -> NewOrder {
        NewOrder {
            client_name: "Paula Herrera".to_string(),
            client_phone: None,
            client_document: None,
            employee_id: "emp-1".to_string(),
            laboratory_id: None,
            discount_cents: 0,
            notes: None,
            items: vec![NewOrderItem {
                product_name: "Armazón acetato".to_string(),
                description: None,
                quantity: 1,
                unit_price_cents: total_cents,
            }],
        }
    }

    pub async fn create_order(db: &Database, total_cents: i64) -> Order {
        OrderService::new(db.clone())
            .create(new_order(total_cents))
            .await
            .expect("create order")
    }

    pub async fn create_client(db: &Database, document: &str, debt_cents: i64) -> String {
        LegacyClientService::new(db.clone())
            .create(NewLegacyClient {
                first_name: "Rosa".to_string(),
                last_name: "Medina".to_string(),
                document_number: document.to_string(),
                phone: None,
                email: None,
                initial_debt_cents: debt_cents,
                notes: None,
            })
            .await
            .expect("create client")
            .id
    }

    pub fn payment(kind: PaymentKind, method: PaymentMethod, amount_cents: i64) -> NewPayment {
        NewPayment {
            kind,
            method,
            amount_cents,
            order_id: None,
            legacy_client_id: None,
            employee_id: "emp-1".to_string(),
            reference: None,
            notes: None,
            check: None,
            installments: None,
        }
    }

    pub fn order_payment(order_id: &str, method: PaymentMethod, amount_cents: i64) -> NewPayment {
        NewPayment {
            order_id: Some(order_id.to_string()),
            ..payment(PaymentKind::OrderPayment, method, amount_cents)
        }
    }
}
