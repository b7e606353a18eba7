//! Embedded schema migrations.
//!
//! Everything under `migrations/sqlite/` is compiled into the binary.
//! `Database::new` applies what is pending unless the config turns that
//! off; `/health` reports where the schema stands through [`SchemaStatus`].
//!
//! New changes go in a new `NNN_description.sql` file. Applied files are
//! checksummed by sqlx, so they are never edited.

use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// The database schema compared with the migrations this binary carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    /// Highest applied version; `None` on a fresh file.
    pub version: Option<i64>,
    /// Highest version known to this binary.
    pub latest: i64,
    /// `"<version>: <description>"` of every migration not applied yet.
    pub pending: Vec<String>,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies pending migrations, logging each one.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let status = schema_status(pool).await?;
    if status.is_current() {
        info!(version = ?status.version, "Schema up to date");
        return Ok(());
    }

    for migration in &status.pending {
        info!(%migration, "Applying migration");
    }
    MIGRATOR.run(pool).await?;

    info!(from = ?status.version, to = status.latest, "Schema migrated");
    Ok(())
}

pub async fn schema_status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    // sqlx creates its bookkeeping table on the first run
    let applied: Vec<i64> =
        match sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await
        {
            Ok(versions) => versions,
            Err(sqlx::Error::Database(e)) if e.message().contains("no such table") => Vec::new(),
            Err(e) => return Err(e.into()),
        };

    let known = MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_up_migration());

    let mut latest = 0;
    let mut pending = Vec::new();
    for migration in known {
        latest = latest.max(migration.version);
        if !applied.contains(&migration.version) {
            pending.push(format!("{}: {}", migration.version, migration.description));
        }
    }

    Ok(SchemaStatus {
        version: applied.iter().copied().max(),
        latest,
        pending,
    })
}
