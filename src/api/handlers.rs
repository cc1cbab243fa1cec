use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::contracts::{IdFactory, IdFactoryError};
use crate::metrics::Histogram;
use crate::storage::{next_id_with_retry, RetryConfig};

/// Server metrics for monitoring.
pub struct Metrics {
    pub ids_issued_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub not_ready_total: AtomicU64,
    pub issue_latency_us: Histogram,
    pub start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ids_issued_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            not_ready_total: AtomicU64::new(0),
            issue_latency_us: Histogram::new(),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn record_issue(&self, latency_us: u64) {
        self.ids_issued_total.fetch_add(1, Ordering::Relaxed);
        self.issue_latency_us.observe(latency_us);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_ready(&self) {
        self.not_ready_total.fetch_add(1, Ordering::Relaxed);
    }
}

/// Whole microseconds in `d`, saturating at `u64::MAX`.
fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Application state shared across handlers.
pub struct AppState<F: IdFactory> {
    pub factory: Arc<F>,
    pub metrics: Arc<Metrics>,
    pub retry: RetryConfig,
}

impl<F: IdFactory> AppState<F> {
    pub fn new(factory: Arc<F>, metrics: Arc<Metrics>, retry: RetryConfig) -> Self {
        Self {
            factory,
            metrics,
            retry,
        }
    }
}

/// Response for `POST /ids/next`.
#[derive(Debug, Serialize)]
pub struct NextIdResponse {
    pub id: String,
}

/// Response for `GET /collection`.
#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub uri: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type.
pub enum ApiError {
    NotReady,
    Factory(IdFactoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_response) = match self {
            ApiError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: "Id factory is not initialized".into(),
                    code: "NOT_READY".into(),
                },
            ),
            ApiError::Factory(e @ IdFactoryError::Io { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: e.to_string(),
                    code: "STORE_IO".into(),
                },
            ),
            ApiError::Factory(e @ IdFactoryError::Configuration(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: e.to_string(),
                    code: "CONFIGURATION".into(),
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<IdFactoryError> for ApiError {
    fn from(e: IdFactoryError) -> Self {
        ApiError::Factory(e)
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// POST /ids/next
/// Issues the next id of the collection.
pub async fn next_id<F: IdFactory>(
    State(state): State<Arc<AppState<F>>>,
) -> Result<Json<NextIdResponse>, ApiError> {
    let start = Instant::now();

    match next_id_with_retry(state.factory.as_ref(), &state.retry).await {
        Ok(Some(id)) => {
            state.metrics.record_issue(duration_us(start.elapsed()));
            Ok(Json(NextIdResponse { id }))
        }
        Ok(None) => {
            state.metrics.record_not_ready();
            Err(ApiError::NotReady)
        }
        Err(e) => {
            state.metrics.record_error();
            tracing::error!(error = %e, "Failed to issue id");
            Err(e.into())
        }
    }
}

/// GET /collection
/// Returns the canonical URI of the backing collection.
pub async fn collection_info<F: IdFactory>(
    State(state): State<Arc<AppState<F>>>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let uri = state.factory.collection_uri().ok_or(ApiError::NotReady)?;
    Ok(Json(CollectionResponse {
        uri: uri.to_string(),
    }))
}

/// GET /metrics
/// Returns metrics in Prometheus text exposition format.
pub async fn metrics<F: IdFactory>(State(state): State<Arc<AppState<F>>>) -> impl IntoResponse {
    let metrics = &state.metrics;

    let mut output = format!(
        "# HELP seqstore_uptime_secs Server uptime in seconds\n\
         # TYPE seqstore_uptime_secs gauge\n\
         seqstore_uptime_secs {:.3}\n\
         \n\
         # HELP seqstore_ids_issued_total Ids issued\n\
         # TYPE seqstore_ids_issued_total counter\n\
         seqstore_ids_issued_total {}\n\
         \n\
         # HELP seqstore_errors_total Id requests that failed in the store\n\
         # TYPE seqstore_errors_total counter\n\
         seqstore_errors_total {}\n\
         \n\
         # HELP seqstore_not_ready_total Id requests made before initialization\n\
         # TYPE seqstore_not_ready_total counter\n\
         seqstore_not_ready_total {}\n\
         \n",
        metrics.uptime_secs(),
        metrics.ids_issued_total.load(Ordering::Relaxed),
        metrics.errors_total.load(Ordering::Relaxed),
        metrics.not_ready_total.load(Ordering::Relaxed),
    );

    output.push_str(&metrics.issue_latency_us.format_prometheus(
        "seqstore_issue_latency_us",
        "Latency of successful id requests in microseconds",
    ));

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_track_uptime() {
        let metrics = Metrics::default();
        std::thread::sleep(Duration::from_millis(5));
        assert!(metrics.uptime_secs() > 0.0);
    }

    #[test]
    fn record_issue_saturates_huge_latency() {
        let metrics = Metrics::new();
        assert_eq!(duration_us(Duration::from_millis(3)), 3_000);
        metrics.record_issue(duration_us(Duration::MAX));

        assert_eq!(metrics.ids_issued_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.issue_latency_us.snapshot().sum, u64::MAX);
    }

    #[test]
    fn not_ready_maps_to_503() {
        let response = ApiError::NotReady.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
