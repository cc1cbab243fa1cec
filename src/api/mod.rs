mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::contracts::IdFactory;

pub use handlers::{ApiError, AppState, CollectionResponse, ErrorResponse, Metrics, NextIdResponse};

/// Creates the API router.
pub fn create_router<F: IdFactory + 'static>(state: Arc<AppState<F>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ids/next", post(handlers::next_id::<F>))
        .route("/collection", get(handlers::collection_info::<F>))
        .route("/metrics", get(handlers::metrics::<F>))
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Reads `SEQSTORE_HOST` and `SEQSTORE_PORT`, falling back to defaults.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("SEQSTORE_HOST").unwrap_or(default.host),
            port: std::env::var("SEQSTORE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(default.port),
        }
    }
}

/// Starts the HTTP server.
pub async fn start_server<F, S>(
    config: ServerConfig,
    state: Arc<AppState<F>>,
    shutdown: S,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: IdFactory + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
