//! Timer Keeper - countdown timers with categories and completion history
//!
//! This is the main entry point for the timer-keeper application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use timer_keeper::{
    api::create_router,
    config::Config,
    state::AppState,
    storage::FileStore,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("timer_keeper={},tower_http=info", config.log_level()))
        .init();

    info!("Starting timer-keeper v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, data_dir={}, coalesce_ticks={}",
          config.host, config.port, config.data_dir.display(), config.coalesce_ticks);

    let kv = FileStore::open(&config.data_dir).await?;

    // Load persisted state and start the countdown scheduler
    let state = Arc::new(
        AppState::start(Arc::new(kv), config.coalesce_ticks, config.port, config.host.clone()).await,
    );

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET/POST     /timers                     - List or create timers");
    info!("  PATCH/DELETE /timers/:id                 - Update or delete a timer");
    info!("  POST         /timers/:id/start|pause|reset");
    info!("  GET/POST     /categories                 - List or create categories");
    info!("  DELETE       /categories/:name           - Delete a category and its timers");
    info!("  POST         /categories/:name/start|pause|reset");
    info!("  GET/DELETE   /history                    - Completed timers");
    info!("  GET          /status, /health");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        signal = shutdown_signal() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => tracing::error!("Signal handling failed, shutting down: {}", e),
            }
        }
    }

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
