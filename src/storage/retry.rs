//! Caller-side retry for id requests that hit a store failure.
//!
//! The factory itself never retries. Callers that want to ride out brief
//! store hiccups wrap `next_id` with `next_id_with_retry`.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::contracts::{IdFactory, IdFactoryError};

/// Configuration for retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 20,
            max_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Creates a RetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SEQSTORE_RETRY_MAX`: Maximum retry attempts (default: 3)
    /// - `SEQSTORE_RETRY_INITIAL_MS`: Initial backoff delay in ms (default: 20)
    /// - `SEQSTORE_RETRY_MAX_MS`: Maximum backoff delay in ms (default: 1000)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_retries: std::env::var("SEQSTORE_RETRY_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_retries),
            initial_delay_ms: std::env::var("SEQSTORE_RETRY_INITIAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.initial_delay_ms),
            max_delay_ms: std::env::var("SEQSTORE_RETRY_MAX_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_delay_ms),
        }
    }

    /// Creates an exponential backoff builder with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Calls `next_id`, retrying store failures with backoff.
///
/// Only `IdFactoryError::Io` is retried. Each retry is a fresh atomic
/// increment, so a failed attempt never consumes a value.
pub async fn next_id_with_retry<F: IdFactory + ?Sized>(
    factory: &F,
    config: &RetryConfig,
) -> Result<Option<String>, IdFactoryError> {
    (move || async move { factory.next_id() })
        .retry(config.backoff())
        .when(|e: &IdFactoryError| e.is_retryable())
        .notify(|err, dur| {
            tracing::warn!(
                error = %err,
                retry_in = ?dur,
                "Id request failed, retrying"
            );
        })
        .await
}
