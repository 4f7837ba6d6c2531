pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{InventoryError, InventoryResult};

pub use logic::{AccountService, CatalogLookup, InstanceService};

// Export all model types
pub use model::*;

// Export seed module
pub use seed::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use std::sync::Arc;

use crate::config::{AppConfig, StorageBackend};

/// Router with state and serving-layer limits applied
pub fn build_app<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> axum::Router {
    crate::api::routes::create_router_with_timeout(config.request_timeout()).with_state(store)
}

async fn serve_store<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        crate::seed::load_seed_data(&*store).await?;
    }

    let app = build_app(store, config);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Brick inventory server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}

/// Load configuration, open the configured store and serve until shutdown.
///
/// Logging is installed by the binary before this is called.
pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={} backend={:?}",
        config.server_address(),
        config.database.backend
    );

    match config.database.backend {
        StorageBackend::Postgres => {
            let database_url = config.database_url()?;
            let postgres_store =
                PostgresStore::connect(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            postgres_store.migrate().await?;

            serve_store(Arc::new(postgres_store), &config).await
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory store; data is lost on shutdown");
            serve_store(Arc::new(MemoryStore::new()), &config).await
        }
    }
}
