//! Cached, deduplicating, retrying access to a forecast provider.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::cache::{FetchKey, WeatherCache};
use crate::provider::{ForecastProvider, OpenMeteoProvider};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{ForecastSnapshot, Location, WeatherError};
use skycast_core::Config;

/// Per-key guards so that concurrent cache misses share one fetch.
type InFlight = Mutex<HashMap<FetchKey, Arc<tokio::sync::Mutex<()>>>>;

pub struct WeatherClient<P> {
    provider: P,
    cache: Arc<WeatherCache>,
    forecast_retry: RetryConfig,
    search_retry: RetryConfig,
    in_flight: InFlight,
}

impl WeatherClient<OpenMeteoProvider> {
    /// Client for the configured Open-Meteo endpoints.
    pub fn open_meteo(config: &Config) -> Result<Self, WeatherError> {
        let provider = OpenMeteoProvider::new(&config.endpoints, &config.network)?;
        Ok(Self::new(provider, Arc::new(WeatherCache::new()))
            .with_retry_policies(
                RetryConfig::forecast_from(&config.network),
                RetryConfig::search_from(&config.network),
            ))
    }
}

impl<P: ForecastProvider> WeatherClient<P> {
    pub fn new(provider: P, cache: Arc<WeatherCache>) -> Self {
        Self {
            provider,
            cache,
            forecast_retry: RetryConfig::forecast(),
            search_retry: RetryConfig::search(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_policies(mut self, forecast: RetryConfig, search: RetryConfig) -> Self {
        self.forecast_retry = forecast;
        self.search_retry = search;
        self
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Geocode a city name.
    ///
    /// Fails with `EmptyResult` when nothing matches; empty results are not
    /// cached.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<Location>, WeatherError> {
        self.search_cities_cancellable(query, &CancellationToken::new())
            .await
    }

    #[instrument(skip(self, cancel), level = "info")]
    pub async fn search_cities_cancellable(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>, WeatherError> {
        if query.trim().is_empty() {
            return Err(WeatherError::InvalidRequest("empty search query".to_string()));
        }

        if let Some(cached) = self.cache.lookup_city(query) {
            tracing::debug!("Search cache hit for {:?}", query);
            return Ok(cached);
        }

        let key = FetchKey::city(query);
        let guard = self.guard_for(&key);
        let result = {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(WeatherError::Cancelled),
                permit = guard.lock() => Ok(permit),
            };
            match permit {
                Err(e) => Err(e),
                // Another task may have filled the cache while we waited
                Ok(_permit) => match self.cache.lookup_city(query) {
                    Some(cached) => Ok(cached),
                    None => self.search_uncached(query, cancel).await,
                },
            }
        };
        self.release(&key, &guard);
        result
    }

    async fn search_uncached(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>, WeatherError> {
        let results = with_retry(&self.search_retry, cancel, || self.provider.search(query)).await?;
        if results.is_empty() {
            return Err(WeatherError::EmptyResult);
        }

        tracing::info!("Found {} cities for {:?}", results.len(), query);
        self.cache.store_city(query, results.clone());
        Ok(results)
    }

    /// Forecast for a location, from cache when available.
    pub async fn fetch_forecast(&self, location: &Location) -> Result<ForecastSnapshot, WeatherError> {
        self.fetch_forecast_cancellable(location, &CancellationToken::new())
            .await
    }

    /// Forecast for a location; `cancel` aborts the fetch with `Cancelled`.
    #[instrument(skip(self, location, cancel), fields(location = %location.name), level = "info")]
    pub async fn fetch_forecast_cancellable(
        &self,
        location: &Location,
        cancel: &CancellationToken,
    ) -> Result<ForecastSnapshot, WeatherError> {
        let key = FetchKey::forecast(location);

        if let Some(cached) = self.cache.lookup_forecast_key(&key) {
            tracing::debug!("Forecast cache hit for {}", key);
            return Ok(cached);
        }

        let guard = self.guard_for(&key);
        let result = {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(WeatherError::Cancelled),
                permit = guard.lock() => Ok(permit),
            };
            match permit {
                Err(e) => Err(e),
                Ok(_permit) => match self.cache.lookup_forecast_key(&key) {
                    Some(cached) => {
                        tracing::debug!("Forecast for {} filled by a concurrent fetch", key);
                        Ok(cached)
                    }
                    None => self.forecast_uncached(location, &key, cancel).await,
                },
            }
        };
        self.release(&key, &guard);
        result
    }

    /// Network fetch with retry; caches on success before the guard is released.
    async fn forecast_uncached(
        &self,
        location: &Location,
        key: &FetchKey,
        cancel: &CancellationToken,
    ) -> Result<ForecastSnapshot, WeatherError> {
        let snapshot = with_retry(&self.forecast_retry, cancel, || {
            self.provider.forecast(location.latitude, location.longitude)
        })
        .await?;

        tracing::info!("Fetched forecast for {} ({} days)", key, snapshot.daily().len());
        self.cache.store_forecast(location, snapshot.clone());
        Ok(snapshot)
    }

    fn guard_for(&self, key: &FetchKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock();
        Arc::clone(
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Forget the guard once nobody else holds it.
    fn release(&self, key: &FetchKey, guard: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock();
        // One reference in the map, one held by the caller
        if Arc::strong_count(guard) <= 2 {
            in_flight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{location, snapshot, FakeProvider};
    use std::time::Duration;

    fn client(provider: FakeProvider) -> WeatherClient<FakeProvider> {
        WeatherClient::new(provider, Arc::new(WeatherCache::new()))
    }

    #[tokio::test]
    async fn search_is_case_and_whitespace_insensitive() {
        let provider = FakeProvider::default();
        provider.set_search_results(vec![location(1, "Kyoto")]);
        let client = client(provider);

        let first = client.search_cities("Kyoto").await.unwrap();
        let second = client.search_cities("  kyoto ").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.provider().search_calls(), 1);
    }

    #[tokio::test]
    async fn empty_search_result_is_an_error_and_not_cached() {
        let client = client(FakeProvider::default());

        assert!(matches!(client.search_cities("nowhere").await, Err(WeatherError::EmptyResult)));
        assert!(client.cache().lookup_city("nowhere").is_none());
        assert!(matches!(client.search_cities("nowhere").await, Err(WeatherError::EmptyResult)));
        assert_eq!(client.provider().search_calls(), 2);
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_network() {
        let client = client(FakeProvider::default());
        assert!(matches!(client.search_cities("   ").await, Err(WeatherError::InvalidRequest(_))));
        assert_eq!(client.provider().search_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn search_is_not_retried() {
        let provider = FakeProvider::default();
        provider.fail_next_searches(3, || WeatherError::ServerError(500));
        let client = client(provider);

        assert!(matches!(client.search_cities("Oslo").await, Err(WeatherError::ServerError(500))));
        assert_eq!(client.provider().search_calls(), 1);
    }

    #[tokio::test]
    async fn repeated_forecast_fetch_hits_network_once() {
        let provider = FakeProvider::default();
        provider.set_forecast(snapshot(&[(0, 20.0, 10.0), (61, 22.0, 12.0)]));
        let client = client(provider);
        let tokyo = location(7, "Tokyo");

        let first = client.fetch_forecast(&tokyo).await.unwrap();
        let second = client.fetch_forecast(&tokyo).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.provider().forecast_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let provider = FakeProvider::default().with_latency(Duration::from_millis(200));
        provider.set_forecast(snapshot(&[(3, 18.0, 9.0)]));
        let client = Arc::new(client(provider));
        let berlin = location(9, "Berlin");

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let client = Arc::clone(&client);
                let berlin = berlin.clone();
                tokio::spawn(async move { client.fetch_forecast(&berlin).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(client.provider().forecast_calls(), 1);
        assert!(client.in_flight.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn forecast_retries_are_bounded() {
        let provider = FakeProvider::default();
        provider.fail_next_forecasts(5, || WeatherError::TransportError("reset".into()));
        let client = client(provider);

        let result = client.fetch_forecast(&location(1, "Lima")).await;
        assert!(matches!(result, Err(WeatherError::TransportError(_))));
        assert_eq!(client.provider().forecast_calls(), 3);
        assert!(client.cache().lookup_forecast(&location(1, "Lima")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn forecast_recovers_within_retry_budget() {
        let provider = FakeProvider::default();
        provider.fail_next_forecasts(2, || WeatherError::ServerError(502));
        provider.set_forecast(snapshot(&[(0, 30.0, 20.0)]));
        let client = client(provider);

        assert!(client.fetch_forecast(&location(2, "Cairo")).await.is_ok());
        assert_eq!(client.provider().forecast_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_propagates_as_cancelled() {
        let provider = FakeProvider::default().with_latency(Duration::from_secs(5));
        provider.set_forecast(snapshot(&[(0, 10.0, 0.0)]));
        let client = client(provider);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = client
            .fetch_forecast_cancellable(&location(3, "Reykjavik"), &cancel)
            .await;
        assert!(matches!(result, Err(WeatherError::Cancelled)));
        assert!(client.cache().lookup_forecast(&location(3, "Reykjavik")).is_none());
    }

    #[tokio::test]
    async fn invalidated_forecast_is_refetched() {
        let provider = FakeProvider::default();
        provider.set_forecast(snapshot(&[(0, 10.0, 0.0)]));
        let client = client(provider);
        let rome = location(4, "Rome");

        client.fetch_forecast(&rome).await.unwrap();
        client.cache().invalidate_forecast(&rome);
        client.fetch_forecast(&rome).await.unwrap();

        assert_eq!(client.provider().forecast_calls(), 2);
    }
}
