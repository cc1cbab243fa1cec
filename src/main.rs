use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use seqstore::api::{start_server, AppState, Metrics, ServerConfig};
use seqstore::config::{IdFactoryConfig, StoreConfig};
use seqstore::contracts::IdFactory;
use seqstore::storage::{RetryConfig, RocksDbStore, StoreIdFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seqstore=info".parse()?))
        .init();

    tracing::info!("seqstore starting...");

    let store_config = StoreConfig::from_env();
    let store = Arc::new(RocksDbStore::open_with_config(&store_config)?);

    // A bad collection name or an uncreatable counter aborts startup
    let factory = StoreIdFactory::new(store, IdFactoryConfig::from_env());
    if let Err(e) = factory.initialize() {
        tracing::error!(error = %e, "Id factory failed to initialize");
        return Err(e.into());
    }
    tracing::info!(
        collection = %factory.collection_name(),
        uri = factory.collection_uri().unwrap_or_default(),
        "Serving ids"
    );

    let state = Arc::new(AppState::new(
        Arc::new(factory),
        Arc::new(Metrics::new()),
        RetryConfig::from_env(),
    ));

    start_server(ServerConfig::from_env(), state, shutdown_signal()).await?;

    tracing::info!("seqstore stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
