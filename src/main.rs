use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wotespace::auth::AdminKey;
use wotespace::catalog::StaticCatalog;
use wotespace::config::{Config, StoreKind};
use wotespace::engine::Engine;
use wotespace::maintenance::{run_compactor, run_completer};
use wotespace::notify::{NotifyHub, log_confirmations};
use wotespace::store::{BookingStore, InMemoryStore, WalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    wotespace::observability::init(config.metrics_port)?;

    let store: Arc<dyn BookingStore> = match config.store {
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
        StoreKind::Wal => {
            let wal = Arc::new(WalStore::open(&config.wal_path())?);
            tokio::spawn(run_compactor(wal.clone(), config.compact_threshold));
            wal
        }
    };

    let catalog = match &config.spaces_file {
        Some(path) => StaticCatalog::from_file(path)?,
        None => StaticCatalog::with_default_setups(),
    };

    let hub = Arc::new(NotifyHub::new());
    tokio::spawn(log_confirmations(hub.subscribe()));

    let engine = Arc::new(
        Engine::new(store, Arc::new(catalog), hub, config.timezone)
            .require_approval(config.require_approval),
    );
    tokio::spawn(run_completer(engine.clone(), config.complete_interval));

    let addr = SocketAddr::new(config.bind, config.port);
    let listener = TcpListener::bind(addr).await?;
    info!("wotespace listening on {addr}");
    info!("  store: {:?}", config.store);
    info!("  timezone: {}", config.timezone);
    info!("  approval: {}", if config.require_approval { "required" } else { "automatic" });
    let admin = AdminKey::new(config.admin_token.clone());
    info!("  admin routes: {}", if admin.is_configured() { "token" } else { "closed" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight requests
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received, draining requests");
    };

    axum::serve(listener, wotespace::api::router(engine, admin))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("wotespace stopped");
    Ok(())
}
