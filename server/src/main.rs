//! Stockroom HTTP server.
//!
//! Serves the inventory action API over `PostgreSQL` and the on-disk
//! picture libraries.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use stockroom_core::InventoryService;
use stockroom_core::environment::SystemClock;
use stockroom_core::images::{FsImageLibrary, UploadRules};
use stockroom_postgres::{PostgresIdentityDirectory, PostgresInventoryStore};
use stockroom_server::{Config, telemetry};
use stockroom_web::AppState;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    telemetry::init_tracing(&config.server.log_level);

    info!(
        address = %config.bind_address(),
        document_root = %config.images.document_root.display(),
        metrics = config.server.metrics_enabled,
        "Starting Stockroom server"
    );

    info!("Connecting to inventory database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to the inventory database")?;
    let store = PostgresInventoryStore::from_pool(pool.clone());
    if config.database.run_migrations {
        store.migrate().await?;
        info!("Migrations complete");
    }

    let clock = Arc::new(SystemClock);
    let identities = Arc::new(PostgresIdentityDirectory::new(pool));
    let images = Arc::new(FsImageLibrary::new(&config.images.document_root, clock.clone()));
    let service = InventoryService::new(Arc::new(store), identities.clone(), images, clock)
        .with_upload_rules(UploadRules {
            max_bytes: config.images.max_upload_bytes,
        });

    let state = AppState::new(service, identities, config.gateway.token.as_str())
        .with_import_max_bytes(config.images.import_max_bytes);

    let mut app = stockroom_web::router(state);
    if config.server.metrics_enabled {
        let handle = telemetry::install_metrics().context("Failed to install metrics recorder")?;
        app = app.merge(telemetry::metrics_router(handle));
    }
    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Server listening");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            info!("Server stopped");
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    let _ = stop_tx.send(());
    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result??,
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Graceful shutdown timed out, closing remaining connections"
        ),
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
