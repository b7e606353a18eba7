//! Back office API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. A `.env` file in the working directory is read first when
//! present.

use serde::{Deserialize, Serialize};
use std::env;

/// Back office API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server port
    pub http_port: u16,

    /// Address the listener binds to
    pub bind_address: String,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Mercado Pago access token; the gateway is disabled without it
    #[serde(skip_serializing)]
    pub mercadopago_access_token: Option<String>,

    /// Secret for `x-signature` webhook verification; checks are skipped
    /// without it
    #[serde(skip_serializing)]
    pub mercadopago_webhook_secret: Option<String>,

    /// Mercado Pago REST base URL
    pub mercadopago_api_url: String,

    /// Public URL of this server, used to build the webhook
    /// `notification_url`
    pub public_base_url: Option<String>,

    /// Allowed CORS origin (permissive when unset)
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Missing .env is fine; real deployments set the environment directly
        let _ = dotenvy::dotenv();

        let config = AppConfig {
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./optica.db".to_string()),

            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,

            mercadopago_access_token: non_empty("MERCADOPAGO_ACCESS_TOKEN"),

            mercadopago_webhook_secret: non_empty("MERCADOPAGO_WEBHOOK_SECRET"),

            mercadopago_api_url: env::var("MERCADOPAGO_API_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),

            public_base_url: non_empty("PUBLIC_BASE_URL"),

            cors_allowed_origin: non_empty("CORS_ALLOWED_ORIGIN"),
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Where Mercado Pago should post payment notifications.
    pub fn notification_url(&self) -> Option<String> {
        self.public_base_url
            .as_deref()
            .map(|base| format!("{}/api/webhooks/mercadopago", base.trim_end_matches('/')))
    }

    /// `bind_address:http_port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            http_port: 8080,
            bind_address: "0.0.0.0".to_string(),
            database_path: "./optica.db".to_string(),
            db_max_connections: 5,
            mercadopago_access_token: None,
            mercadopago_webhook_secret: None,
            mercadopago_api_url: "https://api.mercadopago.com".to_string(),
            public_base_url: None,
            cors_allowed_origin: None,
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
