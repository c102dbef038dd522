//! crewboard scheduler
//!
//! Serves the allocation store, conflict and cost queries, and the week
//! timeline over HTTP.

use std::sync::Arc;

use anyhow::Result;
use crewboard_scheduler::{
    api,
    catalog::StaticCatalog,
    config::{self, StoreKind},
    db::{AllocationStore, Database, MemoryAllocationStore},
    scheduler::SchedulerService,
    state::AppState,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to CREWBOARD_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting crewboard scheduler");
    info!(
        listen_addr = %config.listen_addr,
        store = config.store.as_str(),
        "Configuration loaded"
    );

    let store: Arc<dyn AllocationStore> = match config.store {
        StoreKind::Memory => {
            warn!("Using in-memory allocation store; data is lost on restart");
            Arc::new(MemoryAllocationStore::new())
        }
        StoreKind::Postgres => {
            let db = match Database::connect(&config.database).await {
                Ok(db) => db,
                Err(e) => {
                    error!(error = %e, "Failed to connect to database");
                    return Err(e.into());
                }
            };

            if config.dev_mode {
                info!("Running database migrations (dev mode)");
                if let Err(e) = db.run_migrations().await {
                    error!(error = %e, "Failed to run migrations");
                    return Err(e.into());
                }
            }

            Arc::new(db.allocation_store())
        }
    };

    let catalog = match &config.catalog_path {
        Some(path) => Arc::new(StaticCatalog::from_file(path)?),
        None => {
            warn!("CREWBOARD_CATALOG_PATH not set; starting with an empty catalog");
            Arc::new(StaticCatalog::new())
        }
    };

    let scheduler = SchedulerService::new(store, catalog.clone(), catalog);
    let state = AppState::new(scheduler, config.store.as_str());
    let app = api::create_router(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);

            let drain_timeout = std::time::Duration::from_secs(10);
            if tokio::time::timeout(drain_timeout, &mut server_handle).await.is_err() {
                warn!("HTTP server did not shut down in time");
            }
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    info!("Scheduler shutdown complete");
    Ok(())
}
