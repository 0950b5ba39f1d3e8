//! Forecast provider adapters.
//!
//! `ForecastProvider` is the single fetch interface used by the client;
//! `OpenMeteoProvider` implements it over the Open-Meteo HTTP API.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use url::Url;

use crate::types::{
    CurrentConditions, DailyForecast, ForecastSnapshot, Location, LocationId, WeatherError,
};
use skycast_core::{EndpointConfig, NetworkConfig};

const SEARCH_RESULT_COUNT: &str = "10";
const DAILY_FIELDS: &str = "weathercode,temperature_2m_max,temperature_2m_min";

/// One network round-trip per call; no caching or retries.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Geocode a place name. An empty list is a valid response.
    async fn search(&self, query: &str) -> Result<Vec<Location>, WeatherError>;

    /// Current conditions and daily series for a coordinate.
    async fn forecast(&self, latitude: f64, longitude: f64)
        -> Result<ForecastSnapshot, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingCity>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingCity {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
    country_code: Option<String>,
    admin1: Option<String>,
}

impl From<GeocodingCity> for Location {
    fn from(city: GeocodingCity) -> Self {
        Location {
            id: LocationId::City(city.id),
            name: city.name,
            latitude: city.latitude,
            longitude: city.longitude,
            admin1: city.admin1,
            country_code: city.country_code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: ApiCurrentWeather,
    daily: ApiDaily,
}

#[derive(Debug, Deserialize)]
struct ApiCurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: i32,
    time: String,
    /// Not requested by default; some mirrors include it.
    apparent_temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiDaily {
    time: Vec<String>,
    weathercode: Vec<i32>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

impl ForecastResponse {
    fn into_snapshot(self) -> Result<ForecastSnapshot, WeatherError> {
        let observed_at = parse_observation_time(&self.current_weather.time)?;
        let current = CurrentConditions {
            temperature: self.current_weather.temperature,
            apparent_temperature: self
                .current_weather
                .apparent_temperature
                .unwrap_or(self.current_weather.temperature),
            wind_speed: self.current_weather.windspeed,
            weather_code: self.current_weather.weathercode,
            observed_at,
        };

        let daily = self.daily;
        let len = daily.time.len();
        if daily.weathercode.len() != len
            || daily.temperature_2m_max.len() != len
            || daily.temperature_2m_min.len() != len
        {
            return Err(WeatherError::DecodingFailed(
                "daily series have mismatched lengths".to_string(),
            ));
        }

        let days = daily
            .time
            .iter()
            .zip(daily.weathercode)
            .zip(daily.temperature_2m_max)
            .zip(daily.temperature_2m_min)
            .map(|(((date, code), max), min)| {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                    WeatherError::DecodingFailed(format!("invalid date {:?}: {}", date, e))
                })?;
                Ok(DailyForecast {
                    date,
                    weather_code: code,
                    temperature_max: max,
                    temperature_min: min,
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        ForecastSnapshot::new(current, days)
            .ok_or_else(|| WeatherError::DecodingFailed("empty daily series".to_string()))
    }
}

/// Open-Meteo reports local time as "YYYY-MM-DDTHH:MM".
fn parse_observation_time(raw: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| WeatherError::DecodingFailed(format!("invalid time {:?}: {}", raw, e)))
}

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Arc<Client>,
    geocoding_url: String,
    forecast_url: String,
    language: String,
}

impl OpenMeteoProvider {
    pub fn new(endpoints: &EndpointConfig, network: &NetworkConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(network.request_timeout())
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            geocoding_url: endpoints.geocoding_url.clone(),
            forecast_url: endpoints.forecast_url.clone(),
            language: endpoints.language.clone(),
        })
    }

    fn build_url(base: &str, params: &[(&str, &str)]) -> Result<Url, WeatherError> {
        Url::parse_with_params(base, params)
            .map_err(|e| WeatherError::InvalidRequest(format!("{}: {}", base, e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, WeatherError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::ServerError(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| WeatherError::DecodingFailed(e.to_string()))
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    #[instrument(skip(self), level = "debug")]
    async fn search(&self, query: &str) -> Result<Vec<Location>, WeatherError> {
        let url = Self::build_url(
            &self.geocoding_url,
            &[
                ("name", query),
                ("count", SEARCH_RESULT_COUNT),
                ("language", self.language.as_str()),
                ("format", "json"),
            ],
        )?;

        let body: GeocodingResponse = self.get_json(url).await?;
        Ok(body
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Location::from)
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastSnapshot, WeatherError> {
        let latitude = latitude.to_string();
        let longitude = longitude.to_string();
        let url = Self::build_url(
            &self.forecast_url,
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current_weather", "true"),
                ("daily", DAILY_FIELDS),
                ("timezone", "auto"),
            ],
        )?;

        let body: ForecastResponse = self.get_json(url).await?;
        body.into_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenMeteoProvider {
        let endpoints = EndpointConfig {
            geocoding_url: format!("{}/v1/search", server.uri()),
            forecast_url: format!("{}/v1/forecast", server.uri()),
            ..EndpointConfig::default()
        };
        OpenMeteoProvider::new(&endpoints, &NetworkConfig::default()).unwrap()
    }

    fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "current_weather": {
                "temperature": 21.4,
                "windspeed": 7.2,
                "weathercode": 2,
                "time": "2024-06-01T12:00"
            },
            "daily": {
                "time": ["2024-06-01", "2024-06-02", "2024-06-03"],
                "weathercode": [2, 61, 0],
                "temperature_2m_max": [24.0, 32.5, 27.1],
                "temperature_2m_min": [15.0, 18.2, 16.0]
            }
        })
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Tokyo"))
            .and(query_param("count", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": 1850147, "name": "Tokyo", "latitude": 35.6895, "longitude": 139.69171,
                     "country": "Japan", "country_code": "JP", "admin1": "Tokyo"}
                ]
            })))
            .mount(&server)
            .await;

        let results = provider_for(&server).search("Tokyo").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, LocationId::City(1850147));
        assert_eq!(results[0].country_code.as_deref(), Some("JP"));
    }

    #[tokio::test]
    async fn test_search_without_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let results = provider_for(&server).search("zzzz").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_forecast_decodes_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("current_weather", "true"))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&server)
            .await;

        let snapshot = provider_for(&server).forecast(35.68, 139.69).await.unwrap();
        assert_eq!(snapshot.daily().len(), 3);
        assert_eq!(snapshot.tomorrow().unwrap().weather_code, 61);
        assert_eq!(snapshot.tomorrow().unwrap().temperature_max, 32.5);
        assert_eq!(snapshot.current().apparent_temperature, 21.4);
        assert_eq!(
            snapshot.today().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = provider_for(&server).forecast(0.0, 0.0).await;
        assert!(matches!(result, Err(WeatherError::ServerError(503))));
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_decoding_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"daily\": 1}"))
            .mount(&server)
            .await;

        let result = provider_for(&server).forecast(0.0, 0.0).await;
        assert!(matches!(result, Err(WeatherError::DecodingFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_daily_series_is_rejected() {
        let server = MockServer::start().await;
        let mut body = forecast_body();
        body["daily"] = serde_json::json!({
            "time": [], "weathercode": [], "temperature_2m_max": [], "temperature_2m_min": []
        });
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let result = provider_for(&server).forecast(0.0, 0.0).await;
        assert!(matches!(result, Err(WeatherError::DecodingFailed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_transport_error() {
        let endpoints = EndpointConfig {
            forecast_url: "http://127.0.0.1:9/v1/forecast".to_string(),
            ..EndpointConfig::default()
        };
        let provider = OpenMeteoProvider::new(&endpoints, &NetworkConfig::default()).unwrap();

        let result = provider.forecast(0.0, 0.0).await;
        assert!(matches!(result, Err(WeatherError::TransportError(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = OpenMeteoProvider::build_url("not a url", &[("a", "b")]);
        assert!(matches!(result, Err(WeatherError::InvalidRequest(_))));
    }

    #[test]
    fn test_observation_time_formats() {
        assert!(parse_observation_time("2024-06-01T12:00").is_ok());
        assert!(parse_observation_time("2024-06-01T12:00:30").is_ok());
        assert!(parse_observation_time("noon").is_err());
    }
}
