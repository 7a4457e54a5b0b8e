//! Application entry point.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use watchledger::api::create_router;
use watchledger::app::{AppState, MarketConfig, TokenTransferFallback};
use watchledger::domain::BlockchainAdapter;
use watchledger::infra::{
    HorizonBlockchainAdapter, HorizonConfig, PostgresConfig, PostgresLedger,
    SimulatedBlockchainAdapter, SimulatedPaymentProcessor, StoredNotifier,
};

/// Application configuration
struct Config {
    database_url: String,
    host: String,
    port: u16,
    /// Optional external token service; the simulated adapter is used
    /// when unset
    horizon_url: Option<String>,
    platform_commission_rate: f64,
    platform_account_user_id: i64,
    default_sale_price_brl: f64,
    token_transfer_fallback: TokenTransferFallback,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let horizon_url = env::var("HORIZON_URL").ok().filter(|u| !u.is_empty());

        let platform_commission_rate = env::var("PLATFORM_COMMISSION_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.03);
        let platform_account_user_id = env::var("PLATFORM_ACCOUNT_USER_ID")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1);
        let default_sale_price_brl = env::var("DEFAULT_SALE_PRICE_BRL")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(50_000.0);

        let token_transfer_fallback = match env::var("TOKEN_TRANSFER_FALLBACK").as_deref() {
            Ok("synthetic") => TokenTransferFallback::Synthetic,
            _ => TokenTransferFallback::Strict,
        };

        Ok(Self {
            database_url,
            host,
            port,
            horizon_url,
            platform_commission_rate,
            platform_account_user_id,
            default_sale_price_brl,
            token_transfer_fallback,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🏗️  Watchledger v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!("📦 Initializing infrastructure...");

    let ledger = PostgresLedger::new(&config.database_url, PostgresConfig::default()).await?;
    ledger.run_migrations().await?;
    info!("   ✓ Database connected and migrations applied");
    let ledger = Arc::new(ledger);

    let blockchain: Arc<dyn BlockchainAdapter> = match &config.horizon_url {
        Some(url) => {
            info!("   ✓ Blockchain adapter: token service at {}", url);
            Arc::new(HorizonBlockchainAdapter::new(HorizonConfig::new(url))?)
        }
        None => {
            warn!("   ⚠ Blockchain adapter: SIMULATED (no HORIZON_URL)");
            Arc::new(SimulatedBlockchainAdapter::new())
        }
    };

    let payment = Arc::new(SimulatedPaymentProcessor::new());
    info!("   ✓ Payment processor: simulated");

    let notifier = Arc::new(StoredNotifier::new(
        Arc::clone(&ledger) as Arc<dyn watchledger::domain::LedgerStore>
    ));

    let market_config = MarketConfig {
        platform_commission_rate: config.platform_commission_rate,
        platform_account_user_id: config.platform_account_user_id,
        default_sale_price_brl: config.default_sale_price_brl,
        token_transfer_fallback: config.token_transfer_fallback,
    };
    info!(
        "   ✓ Market config: commission {:.2}%, fallback {:?}",
        config.platform_commission_rate * 100.0,
        config.token_transfer_fallback
    );

    let app_state = Arc::new(AppState::with_config(
        ledger,
        payment,
        blockchain,
        notifier,
        market_config,
    ));

    let router = create_router(app_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🚀 Server starting on http://{}", addr);
    info!("📖 Swagger UI available at http://{}/swagger-ui", addr);
    info!("📄 OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
