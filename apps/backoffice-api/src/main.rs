//! # Optica Back Office API
//!
//! HTTP server the back office UI talks to.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back Office API Server                           │
//! │                                                                         │
//! │  Back office UI ───► HTTP (8080) ───► Services ───► SQLite             │
//! │                                          │                              │
//! │  Mercado Pago ─── webhooks ──────────────┤                              │
//! │       ▲                                  ▼                              │
//! │       └──────────── REST ──────── PaymentGateway                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use optica_api::gateway::{MercadoPagoClient, PaymentGateway};
use optica_api::{build_router, AppConfig, AppState};
use optica_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Optica back office API...");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        mercadopago = config.mercadopago_access_token.is_some(),
        "Configuration loaded"
    );

    // Open database (migrations run on connect)
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await?;
    info!("Database ready");

    // Mercado Pago is optional
    let gateway: Option<Arc<dyn PaymentGateway>> = match &config.mercadopago_access_token {
        Some(token) => {
            let client = MercadoPagoClient::new(
                &config.mercadopago_api_url,
                token,
                config.notification_url(),
            )?;
            if config.mercadopago_webhook_secret.is_none() {
                warn!("MERCADOPAGO_WEBHOOK_SECRET not set, webhook signatures are not checked");
            }
            Some(Arc::new(client) as Arc<dyn PaymentGateway>)
        }
        None => {
            warn!("MERCADOPAGO_ACCESS_TOKEN not set, Mercado Pago integration disabled");
            None
        }
    };

    let addr = config.listen_addr();
    let state = AppState::new(db.clone(), config, gateway);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("optica_api=info,optica_db=info,tower_http=info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(%e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
