//! # Seed Data Generator
//!
//! Populates a development database with laboratories, imported legacy
//! clients and a handful of pending orders.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p optica-db --bin seed
//!
//! # Specify database path
//! cargo run -p optica-db --bin seed -- --db ./data/optica.db
//! ```
//!
//! Nothing is written when the database already has legacy clients.

use chrono::Utc;
use optica_core::types::{
    Laboratory, LegacyClient, LegacyClientFilter, Order, OrderItem, OrderPaymentStatus,
    OrderStatus, PageRequest,
};
use optica_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

/// (name, contact, city, province)
const LABORATORIES: &[(&str, &str, &str, &str)] = &[
    ("Laboratorio Óptico Norte", "Martín Ríos", "Córdoba", "Córdoba"),
    ("Lentes del Litoral", "Carla Benítez", "Rosario", "Santa Fe"),
    ("Visión Andina", "Hugo Ferreyra", "Mendoza", "Mendoza"),
];

/// (first name, last name, document, debt in cents)
const LEGACY_CLIENTS: &[(&str, &str, &str, i64)] = &[
    ("Rosa", "Medina", "20345678", 4_500_000),
    ("Jorge", "Paz", "17222333", 1_250_000),
    ("Lucía", "Gómez", "33444555", 0),
    ("Ernesto", "Villalba", "12987654", 780_000),
    ("Ana", "Quiroga", "28111999", 0),
    ("Mirta", "Sosa", "14555666", 2_300_000),
];

/// (client, product, description, quantity, unit price in cents)
const ORDERS: &[(&str, &str, &str, i64, i64)] = &[
    ("Paula Herrera", "Armazón acetato", "Modelo 5021 negro", 1, 8_500_000),
    ("Diego Álvarez", "Cristales multifocales", "OD +1.25 OI +1.50 ADD 2.00", 2, 6_200_000),
    ("Carmen López", "Lentes de contacto", "Mensuales, caja x6", 2, 2_400_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./optica_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Optica Back Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./optica_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Optica Back Office Seed Data Generator");
    println!("=========================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db
        .legacy_clients()
        .list(&LegacyClientFilter::default(), PageRequest::new(1, 1))
        .await?
        .total;
    if existing > 0 {
        println!("⚠ Database already has {} legacy clients", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding laboratories...");
    let mut lab_ids = Vec::new();
    for (name, contact, city, province) in LABORATORIES {
        let lab = laboratory(name, contact, city, province);
        if let Err(e) = db.laboratories().insert(&lab).await {
            eprintln!("Failed to insert laboratory {}: {}", name, e);
            continue;
        }
        lab_ids.push(lab.id);
    }
    println!("  ✓ {} laboratories", lab_ids.len());

    println!("Seeding legacy clients...");
    let mut clients = 0;
    for (first, last, document, debt) in LEGACY_CLIENTS {
        let client = legacy_client(first, last, document, *debt);
        if let Err(e) = db.legacy_clients().insert(&client).await {
            eprintln!("Failed to insert client {}: {}", document, e);
            continue;
        }
        clients += 1;
    }
    println!("  ✓ {} legacy clients", clients);

    println!("Seeding orders...");
    let mut conn = db.pool().acquire().await?;
    for (idx, (client, product, description, quantity, unit_price)) in ORDERS.iter().enumerate() {
        let order_number = db.orders().next_order_number(&mut *conn, Utc::now()).await?;
        let order = order(
            &order_number,
            client,
            product,
            description,
            *quantity,
            *unit_price,
            lab_ids.get(idx % lab_ids.len().max(1)).cloned(),
        );
        if let Err(e) = db.orders().insert(&mut *conn, &order).await {
            eprintln!("Failed to insert order {}: {}", order_number, e);
            continue;
        }
        println!("  ✓ {} for {}", order.order_number, order.client_name);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn laboratory(name: &str, contact: &str, city: &str, province: &str) -> Laboratory {
    let now = Utc::now();
    Laboratory {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        contact_name: Some(contact.to_string()),
        email: None,
        phone: None,
        street: None,
        city: Some(city.to_string()),
        province: Some(province.to_string()),
        postal_code: None,
        notes: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn legacy_client(first: &str, last: &str, document: &str, debt_cents: i64) -> LegacyClient {
    let now = Utc::now();
    LegacyClient {
        id: Uuid::new_v4().to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        document_number: document.to_string(),
        phone: None,
        email: None,
        initial_debt_cents: debt_cents,
        current_debt_cents: debt_cents,
        last_payment_at: None,
        notes: Some("Importado del sistema anterior".to_string()),
        created_at: now,
        updated_at: now,
    }
}

fn order(
    order_number: &str,
    client: &str,
    product: &str,
    description: &str,
    quantity: i64,
    unit_price_cents: i64,
    laboratory_id: Option<String>,
) -> Order {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();
    let line_total = quantity * unit_price_cents;

    Order {
        id: id.clone(),
        order_number: order_number.to_string(),
        client_name: client.to_string(),
        client_phone: None,
        client_document: None,
        employee_id: "seed".to_string(),
        laboratory_id,
        status: OrderStatus::Pending,
        payment_status: OrderPaymentStatus::Pending,
        subtotal_cents: line_total,
        discount_cents: 0,
        total_cents: line_total,
        paid_cents: 0,
        notes: None,
        created_at: now,
        updated_at: now,
        delivered_at: None,
        cancelled_at: None,
        items: vec![OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: id,
            product_name: product.to_string(),
            description: Some(description.to_string()),
            quantity,
            unit_price_cents,
            line_total_cents: line_total,
        }],
    }
}
