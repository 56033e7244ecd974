use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use filter_service::api::{AppState, router};
use filter_service::config::{ServiceConfig, StorageBackend};
use filter_service::oracle::HttpBannedTermOracle;
use filter_service::probe::HttpLinkProbe;
use filter_service::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;

    eprintln!("🛡️  Filter Service v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}/api", config.bind_addr());
    eprintln!("   Language service: {}", config.language_service);
    match &config.storage {
        StorageBackend::LibSql { path } => eprintln!("   Storage: libsql ({path})"),
        StorageBackend::Memory => eprintln!("   Storage: memory"),
    }

    // ── Storage ─────────────────────────────────────────────────────────
    let store = store::open(&config.storage)
        .await
        .context("failed to open storage")?;

    // ── Collaborators ───────────────────────────────────────────────────
    let oracle = Arc::new(HttpBannedTermOracle::new(
        &config.language_service,
        config.oracle_timeout,
    ));
    info!(url = %oracle.url(), "Banned word source configured");
    let probe = Arc::new(HttpLinkProbe::new(config.probe_timeout));

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = router(AppState::new(store, oracle, probe));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    info!(addr = %config.bind_addr(), "Filter service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Filter service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
