//! # Laboratory Repository
//!
//! CRUD for the external labs orders are sent to.

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::like_pattern;
use optica_core::types::{Laboratory, LaboratoryFilter, LaboratoryInput, Page, PageRequest};

const COLUMNS: &str = "id, name, contact_name, email, phone, street, city, province, \
     postal_code, notes, is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
struct LaboratoryRecord {
    id: String,
    name: String,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    street: Option<String>,
    city: Option<String>,
    province: Option<String>,
    postal_code: Option<String>,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LaboratoryRecord> for Laboratory {
    fn from(r: LaboratoryRecord) -> Self {
        Laboratory {
            id: r.id,
            name: r.name,
            contact_name: r.contact_name,
            email: r.email,
            phone: r.phone,
            street: r.street,
            city: r.city,
            province: r.province,
            postal_code: r.postal_code,
            notes: r.notes,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for laboratory database operations.
#[derive(Debug, Clone)]
pub struct LaboratoryRepository {
    pool: SqlitePool,
}

impl LaboratoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LaboratoryRepository { pool }
    }

    /// Inserts a laboratory.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the name is taken (case-insensitive).
    pub async fn insert(&self, lab: &Laboratory) -> DbResult<()> {
        debug!(id = %lab.id, name = %lab.name, "Inserting laboratory");

        sqlx::query(
            r#"
            INSERT INTO laboratories (
                id, name, contact_name, email, phone, street, city, province,
                postal_code, notes, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&lab.id)
        .bind(&lab.name)
        .bind(&lab.contact_name)
        .bind(&lab.email)
        .bind(&lab.phone)
        .bind(&lab.street)
        .bind(&lab.city)
        .bind(&lab.province)
        .bind(&lab.postal_code)
        .bind(&lab.notes)
        .bind(lab.is_active)
        .bind(lab.created_at)
        .bind(lab.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &lab.name))?;

        Ok(())
    }

    /// Gets a laboratory by ID.
    pub async fn fetch<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Laboratory>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {COLUMNS} FROM laboratories WHERE id = ?1");
        let record = sqlx::query_as::<_, LaboratoryRecord>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record.map(Laboratory::from))
    }

    /// Lists laboratories by name.
    pub async fn list(
        &self,
        filter: &LaboratoryFilter,
        page: PageRequest,
    ) -> DbResult<Page<Laboratory>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM laboratories WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM laboratories WHERE 1 = 1"));
        push_filters(&mut select, filter);
        select.push(" ORDER BY name ASC LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let records = select
            .build_query_as::<LaboratoryRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            records.into_iter().map(Laboratory::from).collect(),
            total as u64,
            page,
        ))
    }

    /// Replaces a laboratory's data.
    pub async fn update(&self, id: &str, input: &LaboratoryInput) -> DbResult<()> {
        debug!(id = %id, name = %input.name, "Updating laboratory");

        let result = sqlx::query(
            r#"
            UPDATE laboratories SET
                name = ?1, contact_name = ?2, email = ?3, phone = ?4, street = ?5,
                city = ?6, province = ?7, postal_code = ?8, notes = ?9, updated_at = ?10
            WHERE id = ?11
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.contact_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.province)
        .bind(&input.postal_code)
        .bind(&input.notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &input.name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Laboratory", id));
        }

        Ok(())
    }

    /// Activates or deactivates a laboratory.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting laboratory active flag");

        let result =
            sqlx::query("UPDATE laboratories SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(active)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Laboratory", id));
        }

        Ok(())
    }

    /// Deletes a laboratory no order refers to.
    ///
    /// ## Errors
    /// `DbError::ForeignKeyViolation` when orders still point to it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting laboratory");

        let result = sqlx::query("DELETE FROM laboratories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Laboratory", id));
        }

        Ok(())
    }
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name.trim()),
        other => other,
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LaboratoryFilter) {
    if let Some(active) = filter.active {
        builder.push(" AND is_active = ");
        builder.push_bind(active);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        builder.push(" AND (name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR city LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

// =============================================================================
// Tests
// =============================================================================
