//! # Pharmacon Server binary
//!
//! ```text
//! config ──► tracing ──► SQLite (migrations) ──► AppState ──► axum::serve
//!                                                              │
//!                                          Ctrl+C / SIGTERM ───┘ graceful
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pharmacon_db::{Database, DbConfig};
use pharmacon_server::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Pharmacon server...");
    if config.uses_dev_secret() {
        warn!("Using the built-in development token secret; set PHARMACON_TOKEN_SECRET");
    }

    let db = Database::new(DbConfig::new(config.database_path.clone()))
        .await
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    info!(path = %config.database_path.display(), "Database ready");

    tokio::fs::create_dir_all(&config.document_dir)
        .await
        .with_context(|| format!("creating {}", config.document_dir.display()))?;

    let addr = config.bind_addr()?;
    let state = AppState::new(db.clone(), config);
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
