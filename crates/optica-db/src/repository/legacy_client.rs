//! # Legacy Client Repository
//!
//! Customers imported from the previous system. Only their debt is
//! tracked: `current_debt_cents` goes down with debt payments and back up
//! when such a payment is cancelled or its check bounces.

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::like_pattern;
use optica_core::money::Money;
use optica_core::types::{LegacyClient, LegacyClientFilter, LegacyClientUpdate, Page, PageRequest};

const COLUMNS: &str = "id, first_name, last_name, document_number, phone, email, \
     initial_debt_cents, current_debt_cents, last_payment_at, notes, created_at, updated_at";

#[derive(Debug, FromRow)]
struct LegacyClientRecord {
    id: String,
    first_name: String,
    last_name: String,
    document_number: String,
    phone: Option<String>,
    email: Option<String>,
    initial_debt_cents: i64,
    current_debt_cents: i64,
    last_payment_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LegacyClientRecord> for LegacyClient {
    fn from(r: LegacyClientRecord) -> Self {
        LegacyClient {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            document_number: r.document_number,
            phone: r.phone,
            email: r.email,
            initial_debt_cents: r.initial_debt_cents,
            current_debt_cents: r.current_debt_cents,
            last_payment_at: r.last_payment_at,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for legacy client database operations.
#[derive(Debug, Clone)]
pub struct LegacyClientRepository {
    pool: SqlitePool,
}

impl LegacyClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LegacyClientRepository { pool }
    }

    /// Inserts an imported client.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the document number already exists.
    pub async fn insert(&self, client: &LegacyClient) -> DbResult<()> {
        debug!(id = %client.id, document = %client.document_number, "Inserting legacy client");

        sqlx::query(
            r#"
            INSERT INTO legacy_clients (
                id, first_name, last_name, document_number, phone, email,
                initial_debt_cents, current_debt_cents, last_payment_at, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&client.id)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.document_number)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(client.initial_debt_cents)
        .bind(client.current_debt_cents)
        .bind(client.last_payment_at)
        .bind(&client.notes)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, client.document_number.clone())
            }
            other => other,
        })?;

        Ok(())
    }

    /// Gets a client by ID.
    pub async fn fetch<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<LegacyClient>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM legacy_clients WHERE id = ?1");
        let record = sqlx::query_as::<_, LegacyClientRecord>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(LegacyClient::from))
    }

    /// Gets a client by (normalized) document number.
    pub async fn fetch_by_document(&self, document_number: &str) -> DbResult<Option<LegacyClient>> {
        let sql = format!("SELECT {COLUMNS} FROM legacy_clients WHERE document_number = ?1");
        let record = sqlx::query_as::<_, LegacyClientRecord>(&sql)
            .bind(document_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(LegacyClient::from))
    }

    /// Lists clients by last name.
    pub async fn list(
        &self,
        filter: &LegacyClientFilter,
        page: PageRequest,
    ) -> DbResult<Page<LegacyClient>> {
        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM legacy_clients WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM legacy_clients WHERE 1 = 1"
        ));
        push_filters(&mut select, filter);
        select.push(" ORDER BY last_name ASC, first_name ASC LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let records = select
            .build_query_as::<LegacyClientRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            records.into_iter().map(LegacyClient::from).collect(),
            total as u64,
            page,
        ))
    }

    /// Updates contact data. Debt is untouched.
    pub async fn update_contact(&self, id: &str, update: &LegacyClientUpdate) -> DbResult<()> {
        debug!(id = %id, "Updating legacy client contact data");

        let result = sqlx::query(
            r#"
            UPDATE legacy_clients SET
                first_name = ?1, last_name = ?2, phone = ?3, email = ?4, notes = ?5, updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(update.first_name.trim())
        .bind(update.last_name.trim())
        .bind(&update.phone)
        .bind(&update.email)
        .bind(&update.notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LegacyClient", id));
        }

        Ok(())
    }

    /// Adds `delta` to the current debt (negative for a payment).
    ///
    /// `paid_at` stamps `last_payment_at` when given. Returns the updated
    /// client. The schema refuses a negative debt.
    pub async fn apply_debt_delta(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        delta: Money,
        paid_at: Option<DateTime<Utc>>,
    ) -> DbResult<LegacyClient> {
        debug!(client_id = %id, delta = %delta, "Applying debt delta");

        let result = sqlx::query(
            r#"
            UPDATE legacy_clients SET
                current_debt_cents = current_debt_cents + ?1,
                last_payment_at = COALESCE(?2, last_payment_at),
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(delta.cents())
        .bind(paid_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LegacyClient", id));
        }

        self.fetch(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("LegacyClient", id))
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LegacyClientFilter) {
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        builder.push(" AND (first_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR last_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR (first_name || ' ' || last_name) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR document_number LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
    match filter.with_debt {
        Some(true) => {
            builder.push(" AND current_debt_cents > 0");
        }
        Some(false) => {
            builder.push(" AND current_debt_cents = 0");
        }
        None => {}
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{legacy_client, test_db};

    #[tokio::test]
    async fn test_insert_and_document_unique() {
        let db = test_db().await;
        let repo = db.legacy_clients();
        let client = legacy_client("30111222", 15_000);
        repo.insert(&client).await.unwrap();

        let found = repo.fetch_by_document("30111222").await.unwrap().unwrap();
        assert_eq!(found.id, client.id);

        let err = repo.insert(&legacy_client("30111222", 0)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_apply_debt_delta() {
        let db = test_db().await;
        let repo = db.legacy_clients();
        let client = legacy_client("30111222", 15_000);
        repo.insert(&client).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let updated = repo
            .apply_debt_delta(&mut conn, &client.id, Money::from_cents(-5_000), Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(updated.current_debt_cents, 10_000);
        assert_eq!(updated.initial_debt_cents, 15_000);
        assert!(updated.last_payment_at.is_some());

        // Debt cannot go below zero
        assert!(repo
            .apply_debt_delta(&mut conn, &client.id, Money::from_cents(-20_000), None)
            .await
            .is_err());

        assert!(matches!(
            repo.apply_debt_delta(&mut conn, "missing", Money::from_cents(1), None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_contact_and_list() {
        let db = test_db().await;
        let repo = db.legacy_clients();
        let owing = legacy_client("30111222", 15_000);
        let settled = legacy_client("27999888", 0);
        repo.insert(&owing).await.unwrap();
        repo.insert(&settled).await.unwrap();

        repo.update_contact(
            &settled.id,
            &LegacyClientUpdate {
                first_name: "Elena".to_string(),
                last_name: "Suárez".to_string(),
                phone: Some("351 555 0101".to_string()),
                email: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        let with_debt = LegacyClientFilter {
            with_debt: Some(true),
            ..Default::default()
        };
        let page = repo.list(&with_debt, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, owing.id);

        let by_name = LegacyClientFilter {
            search: Some("elena su".to_string()),
            ..Default::default()
        };
        let page = repo.list(&by_name, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].phone.as_deref(), Some("351 555 0101"));

        let by_document = LegacyClientFilter {
            search: Some("2799".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_document, PageRequest::default()).await.unwrap().total, 1);
    }
}
