//! Fixtures and an in-memory `ForecastProvider` for tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::provider::ForecastProvider;
use crate::types::{
    CurrentConditions, DailyForecast, ForecastSnapshot, Location, LocationId, WeatherError,
};

/// A city whose coordinates are derived from `id`, so distinct ids never
/// share a forecast cache entry.
pub fn location(id: i64, name: &str) -> Location {
    Location {
        id: LocationId::City(id),
        name: name.to_string(),
        latitude: 10.0 + id as f64 * 0.5,
        longitude: 20.0 + id as f64 * 0.25,
        admin1: None,
        country_code: None,
    }
}

const DEFAULT_DAY: &[(i32, f64, f64)] = &[(0, 20.0, 10.0)];

/// Snapshot starting 2024-06-01 with one `(code, max, min)` entry per day.
///
/// An empty slice yields a single clear 20/10 day.
pub fn snapshot(days: &[(i32, f64, f64)]) -> ForecastSnapshot {
    let days = if days.is_empty() { DEFAULT_DAY } else { days };
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default();
    let daily = days
        .iter()
        .enumerate()
        .map(|(i, &(code, max, min))| DailyForecast {
            date: start + ChronoDuration::days(i as i64),
            weather_code: code,
            temperature_max: max,
            temperature_min: min,
        })
        .collect::<Vec<_>>();
    let current = CurrentConditions {
        temperature: daily[0].temperature_max,
        apparent_temperature: daily[0].temperature_max,
        wind_speed: 2.0,
        weather_code: daily[0].weather_code,
        observed_at: start.and_hms_opt(9, 0, 0).unwrap_or_default(),
    };
    match ForecastSnapshot::new(current, daily) {
        Some(snapshot) => snapshot,
        None => unreachable!("daily series is non-empty"),
    }
}

type ErrorFactory = Box<dyn Fn() -> WeatherError + Send + Sync>;

#[derive(Default)]
struct Failures {
    remaining: u32,
    make: Option<ErrorFactory>,
}

impl Failures {
    fn take(&mut self) -> Option<WeatherError> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.make.as_ref().map(|make| make())
    }
}

/// Scriptable provider that counts calls.
#[derive(Default)]
pub struct FakeProvider {
    search_results: Mutex<Vec<Location>>,
    forecast: Mutex<Option<ForecastSnapshot>>,
    search_failures: Mutex<Failures>,
    forecast_failures: Mutex<Failures>,
    search_calls: AtomicU32,
    forecast_calls: AtomicU32,
    latency: Option<Duration>,
}

impl FakeProvider {
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_search_results(&self, results: Vec<Location>) {
        *self.search_results.lock() = results;
    }

    pub fn set_forecast(&self, snapshot: ForecastSnapshot) {
        *self.forecast.lock() = Some(snapshot);
    }

    pub fn fail_next_searches<F>(&self, count: u32, make: F)
    where
        F: Fn() -> WeatherError + Send + Sync + 'static,
    {
        *self.search_failures.lock() = Failures {
            remaining: count,
            make: Some(Box::new(make)),
        };
    }

    pub fn fail_next_forecasts<F>(&self, count: u32, make: F)
    where
        F: Fn() -> WeatherError + Send + Sync + 'static,
    {
        *self.forecast_failures.lock() = Failures {
            remaining: count,
            make: Some(Box::new(make)),
        };
    }

    pub fn search_calls(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn forecast_calls(&self) -> u32 {
        self.forecast_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ForecastProvider for FakeProvider {
    async fn search(&self, _query: &str) -> Result<Vec<Location>, WeatherError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if let Some(e) = self.search_failures.lock().take() {
            return Err(e);
        }
        Ok(self.search_results.lock().clone())
    }

    async fn forecast(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<ForecastSnapshot, WeatherError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if let Some(e) = self.forecast_failures.lock().take() {
            return Err(e);
        }
        self.forecast
            .lock()
            .clone()
            .ok_or_else(|| WeatherError::ServerError(404))
    }
}
