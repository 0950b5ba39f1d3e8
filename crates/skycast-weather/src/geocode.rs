//! Reverse geocoding: convert coordinates to a place name.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::types::{Coordinates, Location, LocationId, WeatherError};
use skycast_core::{EndpointConfig, NetworkConfig};

const USER_AGENT: &str = concat!("SkyCast/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country_code: Option<String>,
}

/// Place details resolved for a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Place {
    pub name: Option<String>,
    pub admin1: Option<String>,
    pub country_code: Option<String>,
}

impl From<NominatimAddress> for Place {
    fn from(addr: NominatimAddress) -> Self {
        // Prefer city > town > village > municipality > county
        let name = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality)
            .or(addr.county)
            .filter(|n| !n.is_empty());
        Self {
            name,
            admin1: addr.state.filter(|s| !s.is_empty()),
            country_code: addr.country_code.map(|c| c.to_ascii_uppercase()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReverseGeocoder {
    client: Client,
    base_url: String,
    language: String,
}

impl ReverseGeocoder {
    pub fn new(endpoints: &EndpointConfig, network: &NetworkConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(network.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: endpoints.reverse_geocoding_url.clone(),
            language: endpoints.language.clone(),
        })
    }

    /// Look up the place at `coords`.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, coords: Coordinates) -> Result<Place, WeatherError> {
        let latitude = coords.latitude.to_string();
        let longitude = coords.longitude.to_string();
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
                ("zoom", "10"),
                ("accept-language", self.language.as_str()),
            ],
        )
        .map_err(|e| WeatherError::InvalidRequest(format!("{}: {}", self.base_url, e)))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::ServerError(status.as_u16()));
        }
        let body = response.bytes().await?;
        let parsed: NominatimResponse = serde_json::from_slice(&body)
            .map_err(|e| WeatherError::DecodingFailed(e.to_string()))?;

        let place = parsed.address.map(Place::from).unwrap_or_default();
        tracing::info!("Reverse geocoded to {:?}", place.name);
        Ok(place)
    }

    /// Build the current-position `Location`.
    ///
    /// Never fails: lookup errors leave only the coordinates and `fallback_name`.
    pub async fn locate(&self, coords: Coordinates, fallback_name: &str) -> Location {
        let place = match self.resolve(coords).await {
            Ok(place) => place,
            Err(e) => {
                tracing::debug!("Reverse geocode failed: {}", e);
                Place::default()
            }
        };
        Location {
            id: LocationId::CurrentPosition,
            name: place.name.unwrap_or_else(|| fallback_name.to_string()),
            latitude: coords.latitude,
            longitude: coords.longitude,
            admin1: place.admin1,
            country_code: place.country_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEATTLE: Coordinates = Coordinates {
        latitude: 47.6062,
        longitude: -122.3321,
        accuracy_meters: None,
    };

    fn geocoder_for(url: String) -> ReverseGeocoder {
        let endpoints = EndpointConfig {
            reverse_geocoding_url: url,
            ..EndpointConfig::default()
        };
        ReverseGeocoder::new(&endpoints, &NetworkConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_prefers_city_and_uppercases_country() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "47.6062"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Seattle, King County, Washington, United States",
                "address": {
                    "city": "Seattle",
                    "county": "King County",
                    "state": "Washington",
                    "country_code": "us"
                }
            })))
            .mount(&server)
            .await;

        let place = geocoder_for(format!("{}/reverse", server.uri()))
            .resolve(SEATTLE)
            .await
            .unwrap();
        assert_eq!(place.name.as_deref(), Some("Seattle"));
        assert_eq!(place.admin1.as_deref(), Some("Washington"));
        assert_eq!(place.country_code.as_deref(), Some("US"));
    }

    #[tokio::test]
    async fn test_locate_uses_current_position_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"village": "Shirakawa", "state": "Gifu", "country_code": "jp"}
            })))
            .mount(&server)
            .await;

        let location = geocoder_for(format!("{}/reverse", server.uri()))
            .locate(SEATTLE, "Current Location")
            .await;
        assert_eq!(location.id, LocationId::CurrentPosition);
        assert_eq!(location.name, "Shirakawa");
        assert_eq!(location.latitude, SEATTLE.latitude);
    }

    #[tokio::test]
    async fn test_locate_falls_back_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let geocoder = geocoder_for(format!("{}/reverse", server.uri()));
        assert!(matches!(
            geocoder.resolve(SEATTLE).await,
            Err(WeatherError::ServerError(500))
        ));

        let location = geocoder.locate(SEATTLE, "Current Location").await;
        assert_eq!(location.name, "Current Location");
        assert!(location.admin1.is_none());
    }

    #[tokio::test]
    async fn test_missing_address_yields_empty_place() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Unable to geocode"
            })))
            .mount(&server)
            .await;

        let place = geocoder_for(format!("{}/reverse", server.uri()))
            .resolve(SEATTLE)
            .await
            .unwrap();
        assert_eq!(place, Place::default());
    }
}
