//! Weather data access for SkyCast
//!
//! Forecasts and city search via Open-Meteo, with an in-process cache,
//! per-key request deduplication and bounded retry. Also hosts the
//! current-position lookup, debounced search and display helpers.

pub mod advice;
pub mod cache;
pub mod client;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod retry;
pub mod search;
pub mod types;
pub mod units;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

pub use advice::clothing_advice;
pub use cache::{FetchKey, WeatherCache};
pub use client::WeatherClient;
pub use geocode::ReverseGeocoder;
pub use location::{
    current_location, request_position, PositionRequests, PositionSource, PositionToken,
};
pub use provider::{ForecastProvider, OpenMeteoProvider};
pub use retry::RetryConfig;
pub use search::SearchDebouncer;
pub use types::*;
pub use units::{format_temperature, resolve_unit};
