//! Application entry point.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use doge_donation_relayer::api::create_router;
use doge_donation_relayer::app::{
    AppService, AppState, PRODUCTION_DOGE_ADDRESS, PRODUCTION_DONATION_WEBHOOK_URL,
    SyncWorkerConfig, TESTNET_DOGE_ADDRESS, TESTNET_DONATION_WEBHOOK_URL, WebhookDispatcher,
    WebhookDispatcherConfig, spawn_sync_worker,
};
use doge_donation_relayer::infra::{
    BlockcypherClient, BlockcypherConfig, DEFAULT_BLOCKCYPHER_API_URL, DEFAULT_MYDOGE_API_URL,
    HttpSignatureVerifier, InMemoryCache, MydogeConfig, MydogeNameResolver, PostgresClient,
    PostgresConfig, TracingErrorReporter,
};

/// Application configuration
struct Config {
    database_url: String,
    host: String,
    port: u16,
    /// `APP_ENV=production` selects the production address and downstream webhook
    is_production: bool,
    doge_address: String,
    blockcypher: BlockcypherConfig,
    donation_webhook_url: String,
    /// Outbound delivery is disabled without a key
    donation_webhook_api_key: Option<SecretString>,
    verify_webhook_signatures: bool,
    mydoge_api_url: String,
    sync_worker: SyncWorkerConfig,
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let is_production = env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        let (default_address, default_webhook_url) = if is_production {
            (PRODUCTION_DOGE_ADDRESS, PRODUCTION_DONATION_WEBHOOK_URL)
        } else {
            (TESTNET_DOGE_ADDRESS, TESTNET_DONATION_WEBHOOK_URL)
        };
        let doge_address = env::var("DOGE_ADDRESS")
            .ok()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| default_address.to_string());

        let page_delay_ms = match env::var("EXPLORER_PAGE_DELAY_MS") {
            Ok(v) => v
                .parse::<u64>()
                .context("EXPLORER_PAGE_DELAY_MS must be a whole number of milliseconds")?,
            Err(_) => 1_000,
        };
        let blockcypher = BlockcypherConfig {
            base_url: env::var("BLOCKCYPHER_API_URL")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_BLOCKCYPHER_API_URL.to_string()),
            token: env::var("BLOCKCYPHER_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            page_delay: Duration::from_millis(page_delay_ms),
            ..Default::default()
        };

        let donation_webhook_url = env::var("DONATION_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_webhook_url.to_string());
        let donation_webhook_api_key = env::var("DONATION_WEBHOOK_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let mydoge_api_url = env::var("MYDOGE_API_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_MYDOGE_API_URL.to_string());

        let sync_interval_secs = env::var("SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(600); // Default: 10 minutes
        let sync_worker = SyncWorkerConfig {
            enabled: env_flag("ENABLE_SYNC_WORKER", true),
            interval: Duration::from_secs(sync_interval_secs),
        };

        Ok(Self {
            database_url,
            host,
            port,
            is_production,
            doge_address,
            blockcypher,
            donation_webhook_url,
            donation_webhook_api_key,
            verify_webhook_signatures: env_flag("VERIFY_WEBHOOK_SIGNATURES", true),
            mydoge_api_url,
            sync_worker,
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
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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

    info!("Doge Donation Relayer v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        address = %config.doge_address,
        production = config.is_production,
        "Monitoring donation address"
    );

    info!("Initializing infrastructure...");

    let postgres_client =
        Arc::new(PostgresClient::new(&config.database_url, PostgresConfig::default()).await?);
    postgres_client.run_migrations().await?;
    info!("   ✓ Database connected and migrations applied");

    if config.blockcypher.token.is_none() {
        warn!("   ⚠ BLOCKCYPHER_TOKEN not set, explorer requests are rate limited more aggressively");
    }
    let explorer = Arc::new(BlockcypherClient::new(config.blockcypher.clone())?);
    info!("   ✓ Explorer client created ({})", config.blockcypher.base_url);

    let cache = Arc::new(InMemoryCache::new());
    let names = Arc::new(MydogeNameResolver::new(
        MydogeConfig {
            base_url: config.mydoge_api_url.clone(),
            ..Default::default()
        },
        Arc::clone(&cache) as _,
    )?);
    info!("   ✓ Cache and name resolver ready");

    let mut service = AppService::new(
        Arc::clone(&postgres_client) as _,
        Arc::clone(&postgres_client) as _,
        explorer,
        cache,
        names,
        config.doge_address.clone(),
    );

    match config.donation_webhook_api_key.clone() {
        Some(api_key) => {
            let dispatcher = WebhookDispatcher::new(
                WebhookDispatcherConfig::new(config.donation_webhook_url.clone(), api_key),
                Arc::clone(&postgres_client) as _,
                Arc::new(TracingErrorReporter),
            )?;
            service = service.with_dispatcher(dispatcher);
            info!("   ✓ Donation webhook enabled ({})", config.donation_webhook_url);
        }
        None => {
            info!("   ○ Donation webhook disabled (no DONATION_WEBHOOK_API_KEY)");
        }
    }

    let mut app_state = AppState::new(Arc::new(service));
    if config.verify_webhook_signatures {
        app_state = app_state.with_signature_verifier(Arc::new(HttpSignatureVerifier::blockcypher()?));
        info!("   ✓ Explorer webhook signature verification enabled");
    } else {
        warn!("   ⚠ Explorer webhook signature verification disabled");
    }
    let app_state = Arc::new(app_state);

    let worker_shutdown_tx = if config.sync_worker.enabled {
        let (_worker_handle, shutdown_tx) =
            spawn_sync_worker(Arc::clone(&app_state.service), config.sync_worker.clone());
        info!(
            "   ✓ Sync worker started (every {}s)",
            config.sync_worker.interval.as_secs()
        );
        Some(shutdown_tx)
    } else {
        info!("   ○ Sync worker disabled");
        None
    };

    let router = create_router(app_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server starting on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(tx) = worker_shutdown_tx {
        let _ = tx.send(true);
    }

    info!("Server shutdown complete");
    Ok(())
}
