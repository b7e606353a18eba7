//! Legacy client service.
//!
//! Clients carried over from the previous system only have a running debt.
//! The debt moves through debt payments; this service never edits it.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use optica_core::validation::{
    normalize_document_number, validate_legacy_client_update, validate_new_legacy_client,
    validate_page, validate_search_query,
};
use optica_core::{
    LegacyClient, LegacyClientFilter, LegacyClientUpdate, NewLegacyClient, Page, PageRequest,
    Payment, PaymentFilter,
};
use optica_db::Database;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct LegacyClientService {
    db: Database,
}

impl LegacyClientService {
    pub fn new(db: Database) -> Self {
        LegacyClientService { db }
    }

    /// Imports a client. The document number is stored digits only.
    pub async fn create(&self, new: NewLegacyClient) -> ApiResult<LegacyClient> {
        validate_new_legacy_client(&new)?;

        let document_number = normalize_document_number(&new.document_number);
        if self
            .db
            .legacy_clients()
            .fetch_by_document(&document_number)
            .await?
            .is_some()
        {
            return Err(ApiError::conflict(format!(
                "A client with document {document_number} already exists"
            )));
        }

        let now = Utc::now();
        let client = LegacyClient {
            id: Uuid::new_v4().to_string(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            document_number,
            phone: new.phone,
            email: new.email,
            initial_debt_cents: new.initial_debt_cents,
            current_debt_cents: new.initial_debt_cents,
            last_payment_at: None,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        self.db.legacy_clients().insert(&client).await?;

        info!(
            client_id = %client.id,
            document = %client.document_number,
            debt = %client.current_debt(),
            "Legacy client created"
        );

        Ok(client)
    }

    pub async fn get(&self, id: &str) -> ApiResult<LegacyClient> {
        self.db
            .legacy_clients()
            .fetch(self.db.pool(), id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Legacy client not found: {id}")))
    }

    pub async fn list(
        &self,
        mut filter: LegacyClientFilter,
        page: PageRequest,
    ) -> ApiResult<Page<LegacyClient>> {
        validate_page(&page)?;
        filter.search = filter
            .search
            .as_deref()
            .map(validate_search_query)
            .transpose()?;
        Ok(self.db.legacy_clients().list(&filter, page).await?)
    }

    pub async fn update(&self, id: &str, update: LegacyClientUpdate) -> ApiResult<LegacyClient> {
        validate_legacy_client_update(&update)?;
        self.db.legacy_clients().update_contact(id, &update).await?;
        info!(client_id = %id, "Legacy client updated");
        self.get(id).await
    }

    /// Debt payments of a client, newest first.
    pub async fn payments(&self, id: &str, page: PageRequest) -> ApiResult<Page<Payment>> {
        validate_page(&page)?;
        self.get(id).await?;

        let filter = PaymentFilter {
            legacy_client_id: Some(id.to_string()),
            ..PaymentFilter::default()
        };
        Ok(self.db.payments().list(&filter, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::payment_service::PaymentService;
    use crate::services::test_support::*;
    use optica_core::{LegacyClientStatus, NewPayment, PaymentKind, PaymentMethod};

    #[tokio::test]
    async fn test_create_normalizes_document() {
        let db = test_db().await;
        let service = LegacyClientService::new(db.clone());
        let id = create_client(&db, "20.345.678", 15_000).await;

        let client = service.get(&id).await.unwrap();
        assert_eq!(client.document_number, "20345678");
        assert_eq!(client.current_debt_cents, 15_000);
        assert_eq!(client.status(), LegacyClientStatus::WithDebt);

        // Same person, different separators
        let err = service
            .create(NewLegacyClient {
                first_name: "Rosa".to_string(),
                last_name: "Medina".to_string(),
                document_number: "20345678".to_string(),
                phone: None,
                email: None,
                initial_debt_cents: 0,
                notes: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_update_keeps_debt() {
        let db = test_db().await;
        let service = LegacyClientService::new(db.clone());
        let id = create_client(&db, "27111222", 8_000).await;

        let updated = service
            .update(
                &id,
                LegacyClientUpdate {
                    first_name: "Rosa María".to_string(),
                    last_name: "Medina".to_string(),
                    phone: Some("+54 341 555-0199".to_string()),
                    email: None,
                    notes: Some("Paga los viernes".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Rosa María");
        assert_eq!(updated.current_debt_cents, 8_000);
    }

    #[tokio::test]
    async fn test_list_and_payment_history() {
        let db = test_db().await;
        let service = LegacyClientService::new(db.clone());
        let owing = create_client(&db, "27111222", 8_000).await;
        create_client(&db, "30999888", 0).await;

        let with_debt = service
            .list(
                LegacyClientFilter {
                    search: None,
                    with_debt: Some(true),
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(with_debt.total, 1);
        assert_eq!(with_debt.items[0].id, owing);

        open_register(&db, 0).await;
        PaymentService::new(db.clone())
            .create(NewPayment {
                legacy_client_id: Some(owing.clone()),
                ..payment(PaymentKind::DebtPayment, PaymentMethod::BankTransfer, 8_000)
            })
            .await
            .unwrap();

        let history = service.payments(&owing, PageRequest::default()).await.unwrap();
        assert_eq!(history.total, 1);

        let settled = service.get(&owing).await.unwrap();
        assert_eq!(settled.status(), LegacyClientStatus::Settled);
    }
}
