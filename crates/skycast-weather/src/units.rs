//! Temperature display.
//!
//! Values are stored in Celsius; conversion happens only when formatting.

use skycast_core::{Locale, TemperatureUnit};

/// Concrete unit for display: `Auto` follows the locale's region.
pub fn resolve_unit(preference: TemperatureUnit, locale: &Locale) -> TemperatureUnit {
    match preference {
        TemperatureUnit::Auto if locale.prefers_fahrenheit() => TemperatureUnit::Fahrenheit,
        TemperatureUnit::Auto => TemperatureUnit::Celsius,
        explicit => explicit,
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Format a Celsius value with one decimal, e.g. `23.4℃` or `74.1℉`.
pub fn format_temperature(celsius: f64, preference: TemperatureUnit, locale: &Locale) -> String {
    match resolve_unit(preference, locale) {
        TemperatureUnit::Fahrenheit => format!("{:.1}℉", celsius_to_fahrenheit(celsius)),
        _ => format!("{:.1}℃", celsius),
    }
}
