//! # optica-db: Database Layer for the Optica Back Office
//!
//! This crate provides database access for the back office.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Back Office Data Flow                               │
//! │                                                                         │
//! │  PaymentService::create (backoffice-api)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     optica-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐  ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories    │  │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                  │  │  (embedded)  │  │   │
//! │  │   │               │    │ OrderRepository  │  │              │  │   │
//! │  │   │ SqlitePool    │◄───│ PaymentRepository│  │ 001_initial  │  │   │
//! │  │   │ Transactions  │    │ CashRegisterRepo │  │   _schema    │  │   │
//! │  │   │               │    │ Laboratory/Legacy│  │              │  │   │
//! │  │   └───────────────┘    └──────────────────┘  └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (orders, payments, registers, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optica_db::{Database, DbConfig};
//!
//! // Create database (migrations run on connect)
//! let config = DbConfig::new("path/to/optica.db");
//! let db = Database::new(config).await?;
//!
//! // Use repositories
//! let open = db.cash_registers().fetch_open(db.pool()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::SchemaStatus;
pub use pool::{Database, DbConfig, DbTransaction};

// Repository re-exports for convenience
pub use repository::cash_register::{CashRegisterRepository, RegisterClosing};
pub use repository::laboratory::LaboratoryRepository;
pub use repository::legacy_client::LegacyClientRepository;
pub use repository::order::OrderRepository;
pub use repository::payment::PaymentRepository;

// Connection type used by transactional repository calls
pub use sqlx::SqliteConnection;
