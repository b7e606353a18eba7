//! Shared application state.

use std::sync::Arc;

use optica_db::Database;

use crate::config::AppConfig;
use crate::gateway::PaymentGateway;
use crate::services::{
    cash_register_service::CashRegisterService, gateway_service::GatewayService,
    laboratory_service::LaboratoryService, legacy_client_service::LegacyClientService,
    order_service::OrderService, payment_service::PaymentService,
};

/// Handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    /// `None` when no Mercado Pago access token is configured.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        AppState {
            db,
            config: Arc::new(config),
            gateway,
        }
    }

    pub fn cash_registers(&self) -> CashRegisterService {
        CashRegisterService::new(self.db.clone())
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(self.db.clone())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.db.clone())
    }

    pub fn laboratories(&self) -> LaboratoryService {
        LaboratoryService::new(self.db.clone())
    }

    pub fn legacy_clients(&self) -> LegacyClientService {
        LegacyClientService::new(self.db.clone())
    }

    pub fn gateway_service(&self) -> GatewayService {
        GatewayService::new(self.db.clone(), self.gateway.clone())
    }
}
