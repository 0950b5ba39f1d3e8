use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::locale::Locale;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (rule store lives here)
    pub config_dir: PathBuf,

    /// Forecast provider endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// HTTP timeout and retry policy
    #[serde(default)]
    pub network: NetworkConfig,

    /// Search-as-you-type behaviour
    #[serde(default)]
    pub search: SearchConfig,

    /// Notification defaults
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Weather display settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Geocoding-by-name endpoint
    pub geocoding_url: String,

    /// Forecast-by-coordinate endpoint
    pub forecast_url: String,

    /// Reverse geocoding endpoint used for the current position
    pub reverse_geocoding_url: String,

    /// Language passed to the geocoding search
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            reverse_geocoding_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for forecast lookups
    pub forecast_max_retries: u32,

    /// Retries after the first attempt for city search
    pub search_max_retries: u32,

    /// First backoff delay; doubles after each failed attempt
    pub initial_retry_delay_ms: u64,

    /// Upper bound for a single backoff delay
    pub max_retry_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            forecast_max_retries: 2,
            search_max_retries: 0,
            initial_retry_delay_ms: 300,
            max_retry_delay_ms: 5000,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Delay before a keystroke turns into a search
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 400 }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Hour used by the default rule
    pub default_hour: u32,

    /// Minute used by the default rule
    pub default_minute: u32,

    /// How long to wait for a position fix, in seconds
    #[serde(default = "default_position_timeout")]
    pub position_timeout_secs: u64,
}

fn default_position_timeout() -> u64 {
    30
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_hour: 20,
            default_minute: 0,
            position_timeout_secs: default_position_timeout(),
        }
    }
}

impl NotificationConfig {
    pub fn position_timeout(&self) -> Duration {
        Duration::from_secs(self.position_timeout_secs)
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Temperature unit preference
    pub temperature_unit: TemperatureUnit,

    /// Locale used for notification text (e.g. "en_US", "ja_JP")
    #[serde(default = "Locale::system")]
    pub locale: Locale,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Auto,
            locale: Locale::system(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            endpoints: EndpointConfig::default(),
            network: NetworkConfig::default(),
            search: SearchConfig::default(),
            notifications: NotificationConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings
    /// are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.endpoints.geocoding_url, "endpoints.geocoding_url", &mut result);
        self.validate_url(&self.endpoints.forecast_url, "endpoints.forecast_url", &mut result);
        self.validate_url(
            &self.endpoints.reverse_geocoding_url,
            "endpoints.reverse_geocoding_url",
            &mut result,
        );

        if self.network.request_timeout_secs == 0 {
            result.add_error("network.request_timeout_secs", "Timeout must be greater than 0");
        } else if self.network.request_timeout_secs > 120 {
            result.add_warning(
                "network.request_timeout_secs",
                "Request timeout is unusually long (>120s)",
            );
        }

        if self.network.forecast_max_retries > 5 {
            result.add_warning(
                "network.forecast_max_retries",
                "More than 5 retries will delay error reporting noticeably",
            );
        }

        if self.network.initial_retry_delay_ms > self.network.max_retry_delay_ms {
            result.add_error(
                "network.initial_retry_delay_ms",
                "Initial retry delay must not exceed max_retry_delay_ms",
            );
        }

        if self.search.debounce_ms == 0 {
            result.add_warning("search.debounce_ms", "Debounce disabled (0 ms)");
        }

        if self.notifications.default_hour > 23 {
            result.add_error("notifications.default_hour", "Hour must be in 0..=23");
        }
        if self.notifications.default_minute > 59 {
            result.add_error("notifications.default_minute", "Minute must be in 0..=59");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the persisted notification rules
    pub fn rules_path(&self) -> PathBuf {
        self.config_dir.join("notification_rules.json")
    }

    /// Path of the persisted favorite cities
    pub fn favorites_path(&self) -> PathBuf {
        self.config_dir.join("favorites.json")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}
