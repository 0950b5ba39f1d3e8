//! In-process cache for geocoding and forecast results.
//!
//! Two independent key spaces: normalized search text and rounded
//! coordinates. Entries live for the lifetime of the process.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::types::{ForecastSnapshot, Location};

/// Normalized cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey(String);

impl FetchKey {
    /// Lower-cased, trimmed search text.
    pub fn city(query: &str) -> Self {
        Self(query.trim().to_lowercase())
    }

    /// Fixed-precision "lat,lon" pair.
    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self(format!("{:.4},{:.4}", latitude, longitude))
    }

    pub fn forecast(location: &Location) -> Self {
        Self::coordinates(location.latitude, location.longitude)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FetchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct WeatherCache {
    cities: Mutex<HashMap<FetchKey, Vec<Location>>>,
    forecasts: Mutex<HashMap<FetchKey, ForecastSnapshot>>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_city(&self, query: &str) -> Option<Vec<Location>> {
        self.cities.lock().get(&FetchKey::city(query)).cloned()
    }

    pub fn store_city(&self, query: &str, results: Vec<Location>) {
        self.cities.lock().insert(FetchKey::city(query), results);
    }

    pub fn lookup_forecast(&self, location: &Location) -> Option<ForecastSnapshot> {
        self.lookup_forecast_key(&FetchKey::forecast(location))
    }

    pub fn store_forecast(&self, location: &Location, snapshot: ForecastSnapshot) {
        self.forecasts
            .lock()
            .insert(FetchKey::forecast(location), snapshot);
    }

    pub(crate) fn lookup_forecast_key(&self, key: &FetchKey) -> Option<ForecastSnapshot> {
        self.forecasts.lock().get(key).cloned()
    }

    /// Drop the cached forecast so the next fetch goes to the network.
    pub fn invalidate_forecast(&self, location: &Location) {
        self.forecasts.lock().remove(&FetchKey::forecast(location));
    }

    pub fn clear(&self) {
        self.cities.lock().clear();
        self.forecasts.lock().clear();
    }

    pub fn len(&self) -> (usize, usize) {
        (self.cities.lock().len(), self.forecasts.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{location, snapshot};
    use std::sync::Arc;

    #[test]
    fn city_keys_ignore_case_and_whitespace() {
        assert_eq!(FetchKey::city("  Tokyo "), FetchKey::city("tokyo"));
        assert_eq!(FetchKey::city("TOKYO").as_str(), "tokyo");
    }

    #[test]
    fn coordinate_keys_are_fixed_precision() {
        assert_eq!(FetchKey::coordinates(35.68951, 139.69171).as_str(), "35.6895,139.6917");
        assert_eq!(
            FetchKey::coordinates(35.689501, 139.691699),
            FetchKey::coordinates(35.68951, 139.69171)
        );
    }

    #[test]
    fn city_round_trip_is_normalized() {
        let cache = WeatherCache::new();
        assert!(cache.lookup_city("Paris").is_none());

        cache.store_city("Paris ", vec![location(1, "Paris")]);
        let hit = cache.lookup_city("  PARIS").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "Paris");
    }

    #[test]
    fn forecast_keyed_by_coordinates() {
        let cache = WeatherCache::new();
        let paris = location(1, "Paris");
        cache.store_forecast(&paris, snapshot(&[(3, 20.0, 10.0)]));

        assert!(cache.lookup_forecast(&paris).is_some());
        assert!(cache.lookup_forecast(&location(2, "Elsewhere")).is_none());

        cache.invalidate_forecast(&paris);
        assert!(cache.lookup_forecast(&paris).is_none());
    }

    #[test]
    fn search_and_forecast_spaces_are_independent() {
        let cache = WeatherCache::new();
        cache.store_city("berlin", vec![location(3, "Berlin")]);
        assert_eq!(cache.len(), (1, 0));
        cache.clear();
        assert_eq!(cache.len(), (0, 0));
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let cache = Arc::new(WeatherCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.store_city(&format!("city {}", i), vec![location(i, "x")]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len().0, 8);
    }
}
