//! Retry with exponential backoff for provider calls.
//!
//! Retries transient failures only (`ServerError`, `TransportError`).
//! Cancellation is never retried and interrupts a pending backoff sleep.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::types::WeatherError;
use skycast_core::NetworkConfig;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 300;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::forecast()
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Forecast lookups: two retries starting at 300 ms.
    pub fn forecast() -> Self {
        Self::new(2, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }

    /// City search: a single attempt.
    pub fn search() -> Self {
        Self::new(0, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }

    pub fn forecast_from(network: &NetworkConfig) -> Self {
        Self::new(
            network.forecast_max_retries,
            network.initial_retry_delay_ms,
            network.max_retry_delay_ms,
        )
    }

    pub fn search_from(network: &NetworkConfig) -> Self {
        Self::new(
            network.search_max_retries,
            network.initial_retry_delay_ms,
            network.max_retry_delay_ms,
        )
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // initial_delay * 2^attempt, capped
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// retries, or `cancel` fires.
///
/// The final error is returned unchanged.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, WeatherError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, WeatherError>>,
{
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(WeatherError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WeatherError::Cancelled),
            result = operation() => result,
        };

        match outcome {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Request succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(WeatherError::Cancelled) => {
                tracing::debug!("Request cancelled on attempt {}", attempt + 1);
                return Err(WeatherError::Cancelled);
            }
            Err(e) if !e.is_transient() => {
                tracing::debug!("Non-retryable error: {}", e);
                return Err(e);
            }
            Err(e) if attempt >= config.max_retries => {
                if config.max_retries > 0 {
                    tracing::error!("All {} attempts exhausted: {}", config.max_retries + 1, e);
                }
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}; waiting {:?}",
                    attempt + 1,
                    config.max_retries + 1,
                    e,
                    delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(WeatherError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
