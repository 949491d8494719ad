//! Watchlist Sync Binary
//!
//! Restores (or logs into) a session, then keeps the catalog and the quote
//! stream in sync and logs every quote until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin watchlist-sync
//! ```
//!
//! # Environment Variables
//!
//! - `WATCHLIST_EMAIL` / `WATCHLIST_PASSWORD`: Log in at startup (both or neither)
//! - `WATCHLIST_API_URL`: Login API base (default: <https://dev-virt-point.utip.work>)
//! - `WATCHLIST_CATALOG_URL`: Catalog WebSocket base
//! - `WATCHLIST_QUOTES_URL`: Quote WebSocket URL
//! - `WATCHLIST_CACHE_PATH`: Durable cache file (default: .watchlist/cache.json)
//! - `WATCHLIST_CATALOG_TIMEOUT_SECS`: Catalog wait before fallback (default: 10)
//! - `WATCHLIST_DEFAULT_SUBSCRIPTIONS`: Symbols subscribed on a fresh cache (default: 10)
//! - `WATCHLIST_RECONNECT_DELAY_INITIAL_MS`, `WATCHLIST_RECONNECT_DELAY_MAX_SECS`,
//!   `WATCHLIST_RECONNECT_DELAY_MULTIPLIER`, `WATCHLIST_MAX_RECONNECT_ATTEMPTS`:
//!   Quote stream backoff
//! - `WATCHLIST_METRICS_PORT`: Prometheus metrics port (default: 0 = disabled)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`: Tracing export
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use watchlist_sync::infrastructure::telemetry;
use watchlist_sync::{
    ClientConfig, DurableCache, FileStore, HttpAuthenticator, IdentitySession, QuoteSubscriber,
    SubscriptionCoordinator, Transport, WatchlistService, WebSocketTransport, init_metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting watchlist sync");

    let config = ClientConfig::from_env()?;
    log_config(&config);

    if config.metrics_port != 0 {
        init_metrics(config.metrics_port)?;
    }

    let cache = DurableCache::new(Arc::new(FileStore::open(&config.cache_path)?));
    let authenticator = Arc::new(HttpAuthenticator::new(&config.endpoints.api_url)?);
    let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new());

    let mut session = IdentitySession::new(cache.clone(), authenticator);
    if let Some(credentials) = &config.credentials {
        session
            .login(credentials.email(), credentials.password())
            .await?;
    } else if !session.restore() {
        tracing::warn!(
            "No cached session and no credentials; set WATCHLIST_EMAIL and WATCHLIST_PASSWORD"
        );
    }

    let coordinator = SubscriptionCoordinator::new(
        cache,
        Arc::clone(&transport),
        config.coordinator_settings(),
    );
    let quotes = QuoteSubscriber::new(transport, config.quote_stream_config());
    let mut service = WatchlistService::new(session, coordinator, quotes);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    tracing::info!("Watchlist sync ready");

    service
        .run(shutdown_token, |quote| {
            tracing::info!(
                symbol = %quote.symbol,
                bid = %quote.bid,
                ask = %quote.ask,
                venue = %quote.venue,
                "Quote"
            );
        })
        .await;

    tracing::info!(
        symbols = service.coordinator().all_symbols().len(),
        subscribed = service.coordinator().subscribed_symbols().len(),
        "Watchlist sync stopped"
    );
    Ok(())
}

/// Log the parsed configuration. Credentials are never logged.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        cache_path = %config.cache_path.display(),
        catalog_timeout_secs = config.catalog_timeout.as_secs(),
        default_subscriptions = config.default_subscriptions,
        metrics_port = config.metrics_port,
        unattended_login = config.credentials.is_some(),
        "Configuration loaded"
    );
    tracing::debug!(
        api_url = %config.endpoints.api_url,
        catalog_url = %config.endpoints.catalog_url,
        quotes_url = %config.endpoints.quotes_url,
        "Endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
