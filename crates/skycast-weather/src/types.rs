use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use skycast_core::Locale;

pub use skycast_core::TemperatureUnit;

/// WMO codes treated as "rain-like": drizzle, rain and thunderstorm.
pub const RAIN_LIKE_CODES: &[i32] = &[51, 53, 55, 56, 57, 61, 63, 65, 80, 81, 82, 95, 96, 99];

/// Whether a WMO weather code counts as rain for alerting purposes.
pub fn is_rain_like(code: i32) -> bool {
    RAIN_LIKE_CODES.contains(&code)
}

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    MainlyClear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 => Self::MainlyClear,
            2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            71 | 73 | 75 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    /// Short description used in notification bodies
    pub fn description(&self, locale: &Locale) -> &'static str {
        if locale.is_japanese() {
            return match self {
                Self::Clear => "快晴",
                Self::MainlyClear => "晴れ",
                Self::PartlyCloudy => "薄曇り",
                Self::Cloudy => "曇天",
                Self::Fog => "霧",
                Self::Drizzle => "霧雨",
                Self::Rain | Self::HeavyRain => "雨",
                Self::Snow => "雪",
                Self::Thunderstorm => "雷雨",
                Self::Unknown => "天気",
            };
        }
        match self {
            Self::Clear => "Clear",
            Self::MainlyClear => "Sunny",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain | Self::HeavyRain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Weather",
        }
    }
}

/// Stable identity of a location, used as the scheduling key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationId {
    /// Geocoded place id from the provider
    City(i64),
    /// Synthetic id for the device's current position
    CurrentPosition,
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::City(id) => write!(f, "{}", id),
            Self::CurrentPosition => f.write_str("current"),
        }
    }
}

/// Geographic location. Equality and hashing use the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub admin1: Option<String>,
    pub country_code: Option<String>,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Location {
    /// "admin1 country" line shown under the city name
    pub fn subtitle(&self, locale: &Locale) -> String {
        let country = self
            .country_code
            .as_deref()
            .map(|code| country_name(code, locale));
        [self.admin1.clone(), country]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Display name for a country code. Only Japan is localized.
pub fn country_name(code: &str, locale: &Locale) -> String {
    match code.to_ascii_uppercase().as_str() {
        "JP" if locale.is_japanese() => "日本".to_string(),
        _ => code.to_string(),
    }
}

/// Current weather conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub wind_speed: f64,
    pub weather_code: i32,
    pub observed_at: NaiveDateTime,
}

impl CurrentConditions {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_code: i32,
    pub temperature_max: f64,
    pub temperature_min: f64,
}

impl DailyForecast {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// Current conditions plus a daily series where index 0 is today.
///
/// The daily series is never empty, including when decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotParts")]
pub struct ForecastSnapshot {
    current: CurrentConditions,
    daily: Vec<DailyForecast>,
}

#[derive(Deserialize)]
struct SnapshotParts {
    current: CurrentConditions,
    daily: Vec<DailyForecast>,
}

impl TryFrom<SnapshotParts> for ForecastSnapshot {
    type Error = &'static str;

    fn try_from(parts: SnapshotParts) -> Result<Self, Self::Error> {
        Self::new(parts.current, parts.daily).ok_or("forecast has no daily entries")
    }
}

impl ForecastSnapshot {
    /// Returns `None` when `daily` is empty.
    pub fn new(current: CurrentConditions, daily: Vec<DailyForecast>) -> Option<Self> {
        if daily.is_empty() {
            return None;
        }
        Some(Self { current, daily })
    }

    pub fn current(&self) -> &CurrentConditions {
        &self.current
    }

    pub fn daily(&self) -> &[DailyForecast] {
        &self.daily
    }

    pub fn today(&self) -> Option<&DailyForecast> {
        self.daily.first()
    }

    /// Index 1, or index 0 when the series has a single day.
    pub fn tomorrow(&self) -> Option<&DailyForecast> {
        self.daily.get(1).or_else(|| self.daily.first())
    }
}

/// Position reported by the platform location facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather client errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Failed to decode response: {0}")]
    DecodingFailed(String),
    #[error("Server error: HTTP {0}")]
    ServerError(u16),
    #[error("No matching results")]
    EmptyResult,
    #[error("Request cancelled")]
    Cancelled,
    #[error("Transport error: {0}")]
    TransportError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            WeatherError::InvalidRequest(e.to_string())
        } else if e.is_decode() {
            WeatherError::DecodingFailed(e.to_string())
        } else if let Some(status) = e.status() {
            WeatherError::ServerError(status.as_u16())
        } else if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            WeatherError::TransportError(e.to_string())
        } else {
            WeatherError::Other(e.into())
        }
    }
}

impl WeatherError {
    /// Whether a retry can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServerError(_) | Self::TransportError(_))
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self, locale: &Locale) -> String {
        if locale.is_japanese() {
            return match self {
                Self::InvalidRequest(_) => "不正なURLです。".to_string(),
                Self::DecodingFailed(_) => "データの解析に失敗しました。".to_string(),
                Self::ServerError(status) => format!("サーバーエラー（{}）。", status),
                Self::EmptyResult => "該当する結果がありません。".to_string(),
                Self::Cancelled => "リクエストはキャンセルされました。".to_string(),
                Self::TransportError(_) => "ネットワークに接続できません。".to_string(),
                Self::Other(e) => e.to_string(),
            };
        }
        match self {
            Self::InvalidRequest(_) => "The request could not be built.".to_string(),
            Self::DecodingFailed(_) => "Failed to read the weather data.".to_string(),
            Self::ServerError(status) => format!("Server error ({}).", status),
            Self::EmptyResult => "No matching results.".to_string(),
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::TransportError(_) => "Network error. Check your connection.".to_string(),
            Self::Other(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(code: i32) -> DailyForecast {
        DailyForecast {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            weather_code: code,
            temperature_max: 25.0,
            temperature_min: 15.0,
        }
    }

    fn current() -> CurrentConditions {
        CurrentConditions {
            temperature: 20.0,
            apparent_temperature: 19.0,
            wind_speed: 3.0,
            weather_code: 0,
            observed_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_wmo_code_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(1), WeatherCondition::MainlyClear);
    }

    #[test]
    fn test_wmo_code_rain() {
        assert_eq!(WeatherCondition::from_wmo_code(61), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(80), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::HeavyRain);
    }

    #[test]
    fn test_freezing_codes_have_no_label() {
        for code in [56, 57, 66, 67, 77] {
            assert_eq!(WeatherCondition::from_wmo_code(code), WeatherCondition::Unknown);
        }
        assert_eq!(WeatherCondition::Unknown.description(&Locale::new("en")), "Weather");
        assert_eq!(WeatherCondition::Unknown.description(&Locale::new("ja")), "天気");
    }

    #[test]
    fn test_wmo_code_unknown() {
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_wmo_code(-1), WeatherCondition::Unknown);
    }

    #[test]
    fn test_condition_description_by_locale() {
        let en = Locale::new("en_US");
        let ja = Locale::new("ja_JP");
        assert_eq!(WeatherCondition::Rain.description(&en), "Rain");
        assert_eq!(WeatherCondition::Rain.description(&ja), "雨");
        assert_eq!(WeatherCondition::Unknown.description(&en), "Weather");
    }

    #[test]
    fn test_rain_like_codes() {
        for code in [51, 61, 65, 80, 95, 99] {
            assert!(is_rain_like(code), "{} should be rain-like", code);
        }
        for code in [0, 2, 3, 45, 71, 85] {
            assert!(!is_rain_like(code), "{} should not be rain-like", code);
        }
    }

    #[test]
    fn test_location_identity_by_id() {
        let a = Location {
            id: LocationId::City(1850147),
            name: "Tokyo".into(),
            latitude: 35.6895,
            longitude: 139.69171,
            admin1: Some("Tokyo".into()),
            country_code: Some("JP".into()),
        };
        let mut b = a.clone();
        b.name = "東京".into();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_location_subtitle() {
        let loc = Location {
            id: LocationId::City(1),
            name: "Osaka".into(),
            latitude: 34.69,
            longitude: 135.50,
            admin1: Some("Osaka".into()),
            country_code: Some("JP".into()),
        };
        assert_eq!(loc.subtitle(&Locale::new("ja_JP")), "Osaka 日本");
        assert_eq!(loc.subtitle(&Locale::new("en_GB")), "Osaka JP");
    }

    #[test]
    fn test_location_id_display() {
        assert_eq!(LocationId::City(42).to_string(), "42");
        assert_eq!(LocationId::CurrentPosition.to_string(), "current");
    }

    #[test]
    fn test_snapshot_requires_daily() {
        assert!(ForecastSnapshot::new(current(), vec![]).is_none());
    }

    #[test]
    fn test_snapshot_tomorrow_falls_back_to_today() {
        let single = ForecastSnapshot::new(current(), vec![day(61)]).unwrap();
        assert_eq!(single.tomorrow().unwrap().weather_code, 61);

        let two = ForecastSnapshot::new(current(), vec![day(0), day(95)]).unwrap();
        assert_eq!(two.today().unwrap().weather_code, 0);
        assert_eq!(two.tomorrow().unwrap().weather_code, 95);
    }

    #[test]
    fn test_decoding_rejects_empty_daily_series() {
        let json = serde_json::json!({
            "current": current(),
            "daily": [],
        });
        assert!(serde_json::from_value::<ForecastSnapshot>(json).is_err());
    }

    #[test]
    fn test_decoding_round_trips_through_constructor() {
        let snapshot = ForecastSnapshot::new(current(), vec![day(3), day(61)]).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: ForecastSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.tomorrow().unwrap().weather_code, 61);
    }

    #[test]
    fn test_error_transience() {
        assert!(WeatherError::ServerError(503).is_transient());
        assert!(WeatherError::TransportError("reset".into()).is_transient());
        assert!(!WeatherError::Cancelled.is_transient());
        assert!(!WeatherError::DecodingFailed("bad".into()).is_transient());
        assert!(!WeatherError::EmptyResult.is_transient());
    }

    #[test]
    fn test_error_user_messages() {
        let en = Locale::new("en");
        assert!(WeatherError::ServerError(502).user_message(&en).contains("502"));
        assert!(WeatherError::Cancelled
            .user_message(&Locale::new("ja"))
            .contains("キャンセル"));
    }
}
