//! # Horizon Reservation Sweeper
//!
//! Standalone process that reclaims expired seat holds until it receives
//! Ctrl+C or SIGTERM.
//!
//! ```text
//! horizon-sweeper [CONFIG_PATH]
//!
//!   config: CONFIG_PATH, else the platform config dir, else defaults,
//!           then HORIZON_* environment overrides
//!   logs:   RUST_LOG (default "info")
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use horizon_db::Database;
use horizon_engine::{BoxOffice, EngineConfig, ReservationSweeper, SystemClock, TracingNotifier};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Horizon reservation sweeper...");

    let config = EngineConfig::load(std::env::args().nth(1).map(PathBuf::from))?;
    info!(
        db_path = %config.database.path.display(),
        interval_secs = config.sweeper.interval_secs,
        batch_size = config.sweeper.batch_size,
        "Configuration loaded"
    );

    let db = Database::new(config.database.db_config()).await?;
    let office = BoxOffice::new(
        db.clone(),
        config,
        Arc::new(SystemClock),
        Arc::new(TracingNotifier),
    );

    let (sweeper, handle) = ReservationSweeper::new(office);
    let task = tokio::spawn(sweeper.run());

    shutdown_signal().await;

    handle.shutdown().await?;
    task.await?;
    db.close().await;

    info!("Sweeper shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sweeper...");
}
