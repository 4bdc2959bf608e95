//! masked-email-bot
//!
//! Telegram bot creating Fastmail masked emails on request. Runs the Telegram
//! polling loop, the OAuth2 redirect endpoint and a periodic purge of expired
//! authorization states until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use meb_core::{Notifier, Store};
use meb_identity_oauth2::TokenExchangeCoordinator;
use meb_jmap::JmapClient;
use meb_server::{Config, MaskedEmailService, Messages, TelegramBot, TelegramNotifier, router};
use meb_store::{FileStore, InMemoryStore};
use meb_telegram::TelegramClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting masked email bot");

    let store = open_store(&config).await?;
    let messages = Arc::new(Messages::embedded().context("Failed to parse message catalogues")?);

    let telegram = TelegramClient::with_api_base_url(&config.telegram.api_base_url, &config.telegram.token)
        .with_debug(config.telegram.debug);
    let me = telegram
        .get_me()
        .await
        .context("Failed to verify the Telegram bot token")?;
    info!(
        "Authorized on Telegram as @{}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(telegram.clone(), messages.clone()));
    let coordinator =
        TokenExchangeCoordinator::new(Arc::new(config.oauth2_provider()), store.clone(), notifier)
            .context("Failed to create the OAuth2 client")?;
    let jmap = JmapClient::new(Arc::new(config.jmap_client())).context("Failed to create the JMAP client")?;
    let service = MaskedEmailService::new(store, coordinator, jmap);

    let shutdown = CancellationToken::new();

    let bot = TelegramBot::new(
        telegram,
        service.clone(),
        messages,
        config.telegram.poll_timeout_seconds,
    );
    let mut polling = tokio::spawn(bot.run(shutdown.clone()));

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local_addr = listener.local_addr().context("Failed to read the listener address")?;
    info!("Redirect endpoint listening on http://{}/redirect", local_addr);

    let app = router(service.clone());
    let http_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await
    });

    let purge = tokio::spawn(purge_expired_states(
        service,
        Duration::from_secs(config.store.cleanup_interval_seconds),
        shutdown.clone(),
    ));

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut server => {
            error!("HTTP server stopped unexpectedly: {:?}", result);
        }
        result = &mut polling => {
            error!("Telegram polling stopped unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down");
    shutdown.cancel();

    if !server.is_finished() {
        match server.await {
            Ok(Err(e)) => warn!("HTTP server error during shutdown: {}", e),
            Err(e) => warn!("HTTP server task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    if !polling.is_finished() {
        if let Err(e) = polling.await {
            warn!("Telegram polling task failed: {}", e);
        }
    }
    if let Err(e) = purge.await {
        warn!("Purge task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format.to_lowercase().as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        "compact" => registry.with(fmt::layer().compact()).init(),
        _ => registry.with(fmt::layer().pretty()).init(),
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.store.backend.to_lowercase().as_str() {
        "memory" => {
            warn!("Using the in-memory store, all state is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        _ => {
            let store = FileStore::open(&config.store.path)
                .await
                .with_context(|| format!("Failed to open store at {}", config.store.path.display()))?;
            info!("Using store at {}", config.store.path.display());
            Ok(Arc::new(store))
        }
    }
}

async fn purge_expired_states(service: MaskedEmailService, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = service.purge_expired().await {
                    warn!("Failed to purge expired authorization states: {}", e);
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
