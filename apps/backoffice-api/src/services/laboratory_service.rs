//! Laboratory service.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use optica_core::validation::{validate_laboratory, validate_page, validate_search_query};
use optica_core::{Laboratory, LaboratoryFilter, LaboratoryInput, Page, PageRequest};
use optica_db::Database;

use crate::error::{ApiError, ApiResult};

/// Body of `PUT /api/laboratories/{id}/active`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetLaboratoryActive {
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct LaboratoryService {
    db: Database,
}

impl LaboratoryService {
    pub fn new(db: Database) -> Self {
        LaboratoryService { db }
    }

    pub async fn create(&self, input: LaboratoryInput) -> ApiResult<Laboratory> {
        validate_laboratory(&input)?;

        let now = Utc::now();
        let lab = Laboratory {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            street: input.street,
            city: input.city,
            province: input.province,
            postal_code: input.postal_code,
            notes: input.notes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.db.laboratories().insert(&lab).await?;

        info!(laboratory_id = %lab.id, name = %lab.name, "Laboratory created");
        Ok(lab)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Laboratory> {
        self.db
            .laboratories()
            .fetch(self.db.pool(), id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Laboratory not found: {id}")))
    }

    pub async fn list(
        &self,
        mut filter: LaboratoryFilter,
        page: PageRequest,
    ) -> ApiResult<Page<Laboratory>> {
        validate_page(&page)?;
        filter.search = filter
            .search
            .as_deref()
            .map(validate_search_query)
            .transpose()?;
        Ok(self.db.laboratories().list(&filter, page).await?)
    }

    pub async fn update(&self, id: &str, input: LaboratoryInput) -> ApiResult<Laboratory> {
        validate_laboratory(&input)?;
        self.db.laboratories().update(id, &input).await?;
        info!(laboratory_id = %id, "Laboratory updated");
        self.get(id).await
    }

    /// Inactive laboratories keep their orders but take no new ones.
    pub async fn set_active(&self, id: &str, active: bool) -> ApiResult<Laboratory> {
        self.db.laboratories().set_active(id, active).await?;
        info!(laboratory_id = %id, active, "Laboratory active flag changed");
        self.get(id).await
    }

    /// Deletes a laboratory with no orders. Deactivate it otherwise.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let lab = self.get(id).await?;
        let orders = self
            .db
            .orders()
            .count_for_laboratory(self.db.pool(), id)
            .await?;
        if orders > 0 {
            return Err(ApiError::conflict(format!(
                "Laboratory {} has {orders} orders; deactivate it instead",
                lab.name
            )));
        }

        self.db.laboratories().delete(id).await?;
        info!(laboratory_id = %id, name = %lab.name, "Laboratory deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::order_service::{AssignLaboratory, OrderService};
    use crate::services::test_support::*;

    fn input(name: &str) -> LaboratoryInput {
        LaboratoryInput {
            name: name.to_string(),
            contact_name: Some("Jorge Díaz".to_string()),
            email: Some("pedidos@labcentral.com.ar".to_string()),
            phone: None,
            street: None,
            city: Some("Córdoba".to_string()),
            province: Some("Córdoba".to_string()),
            postal_code: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let db = test_db().await;
        let service = LaboratoryService::new(db);

        let lab = service.create(input("  Lab Central ")).await.unwrap();
        assert_eq!(lab.name, "Lab Central");
        assert!(lab.is_active);

        let updated = service
            .update(
                &lab.id,
                LaboratoryInput {
                    phone: Some("351 555-0101".to_string()),
                    ..input("Lab Central Norte")
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Lab Central Norte");
        assert_eq!(updated.phone.as_deref(), Some("351 555-0101"));

        let inactive = service.set_active(&lab.id, false).await.unwrap();
        assert!(!inactive.is_active);

        let active_only = service
            .list(
                LaboratoryFilter {
                    active: Some(true),
                    search: None,
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(active_only.total, 0);

        service.delete(&lab.id).await.unwrap();
        assert_eq!(service.get(&lab.id).await.unwrap_err().code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let db = test_db().await;
        let service = LaboratoryService::new(db);
        service.create(input("Lab Central")).await.unwrap();

        let err = service.create(input("Lab Central")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_delete_with_orders_refused() {
        let db = test_db().await;
        let service = LaboratoryService::new(db.clone());
        let lab = service.create(input("Lab Central")).await.unwrap();
        let order = create_order(&db, 10_000).await;
        OrderService::new(db.clone())
            .assign_laboratory(
                &order.id,
                AssignLaboratory {
                    laboratory_id: Some(lab.id.clone()),
                },
            )
            .await
            .unwrap();

        let err = service.delete(&lab.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(service.get(&lab.id).await.is_ok());
    }
}
