// Main entry point - Dependency injection and server setup
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use dashboard_sync::application::config_store::ConfigStore;
use dashboard_sync::application::edit_mode::EditMode;
use dashboard_sync::application::persistence_gateway::PersistenceGateway;
use dashboard_sync::infrastructure::config::load_app_config;
use dashboard_sync::infrastructure::json_file_repository::JsonFileRepository;
use dashboard_sync::presentation::app_state::AppState;
use dashboard_sync::presentation::router::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(JsonFileRepository::new(config.storage.data_dir.clone()));

    // Create services (application layer)
    let gateway = Arc::new(PersistenceGateway::new(repository, config.persistence.settings()));
    let store = ConfigStore::new(gateway.clone());
    store.load(&config.dashboard.default_config).await?;

    let state = Arc::new(AppState {
        store,
        edit_mode: EditMode::new(),
        grid: config.grid.clone(),
    });

    // Build router (presentation layer)
    let router = router(state);

    // Start server
    let addr = config.server.bind_addr;
    tracing::info!(%addr, data_dir = %config.storage.data_dir.display(), "Starting dashboard-sync service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    // Flush whatever is still inside a debounce window
    tracing::info!("Shutting down, flushing pending saves");
    gateway.shutdown().await;

    Ok(())
}
