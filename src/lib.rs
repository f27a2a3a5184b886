pub mod api;
pub mod config;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;
pub use api::{create_router, AppState};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{AppConfig, StoreKind};

/// Build the configured store and serve the API until the listener fails
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    match config.store.kind {
        StoreKind::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            store.migrate().await?;

            serve_store(store, &config).await
        }
        StoreKind::Memory => {
            log::warn!("Using the in-memory store; data is lost on shutdown");
            serve_store(MemoryStore::new(), &config).await
        }
    }
}

async fn serve_store<S: Store + 'static>(store: S, config: &AppConfig) -> anyhow::Result<()> {
    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(&store).await?;
    }

    let state = AppState::new(Arc::new(store), config.page_size());
    let app = create_router::<S>().with_state(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Pet registry running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
