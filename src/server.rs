//! Server startup and shutdown logic.
//!
//! This module contains the `run_server` function which handles:
//! - Database connection and migration running
//! - Origin gate construction from configuration
//! - Router creation
//! - Server binding, startup banner, and graceful shutdown

use crate::config::Config;
use crate::cors::AllowedOrigins;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::routes;
use crate::state;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Run the web server with the given configuration.
///
/// Connects the database, runs migrations when configured, builds the
/// allowed-origin set once for the process lifetime, sets up the router,
/// and serves with graceful shutdown handling.
///
/// # Errors
///
/// This function will return an error if:
/// - Database connection fails
/// - Migration fails
/// - Server binding fails
/// - Server runtime error occurs
pub async fn run_server(config: Config) -> AppResult<()> {
    info!("Starting mediagate server...");

    // Initialize database connection pool
    info!("Connecting to database...");
    let db = Database::connect(&config.database).await?;

    // Run migrations if requested
    if config.database.run_migrations {
        info!("Running database migrations...");
        db.run_migrations().await?;
        info!("Migrations completed successfully");
    }

    // Build the allowed-origin set once; it is immutable afterwards.
    let allowed_origins = AllowedOrigins::new(config.cors.allowed_origins.clone());
    if allowed_origins.is_any() {
        warn!("CORS origin gate is in wildcard mode; all origins will be mirrored");
    } else {
        info!(origins = ?config.cors.allowed_origins, "CORS origin gate configured");
    }

    // Create application state
    let state = Arc::new(state::AppState { db });

    // Create router
    let app = routes::create_router(state, allowed_origins, config.uploads.dir.clone());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server running on http://{}", addr);
    info!("Local access: http://localhost:{}", config.server.port);
    if let Some(local_ip) = &config.server.local_ip {
        info!("Network access: http://{}:{}", local_ip, config.server.port);
    }
    info!("Serving uploads from {}", config.uploads.dir.display());

    // Set up graceful shutdown
    let shutdown_signal = create_shutdown_signal();

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create a future that resolves when a shutdown signal is received.
///
/// On Unix-like systems, this listens for both Ctrl+C (SIGINT) and SIGTERM.
/// On other platforms, it only listens for Ctrl+C.
///
/// # Panics
///
/// Panics if signal handler installation fails. This is intentional because
/// signal handler failures are unrecoverable system-level errors that indicate
/// the OS cannot deliver shutdown signals, making graceful shutdown impossible.
async fn create_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
