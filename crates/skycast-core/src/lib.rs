pub mod config;
pub mod locale;

pub use config::{
    Config, EndpointConfig, NetworkConfig, NotificationConfig, SearchConfig, TemperatureUnit,
    ValidationResult, WeatherConfig,
};
pub use locale::Locale;

use anyhow::Result;

/// Initialize tracing for an embedding application.
///
/// Honours `RUST_LOG`; defaults to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("SkyCast core initialized");
    Ok(())
}
