//! Minimal locale handling for notification text and unit selection.
//!
//! Accepts POSIX (`ja_JP.UTF-8`) and BCP 47 (`en-US`) style tags.

use serde::{Deserialize, Serialize};

/// Regions that conventionally display Fahrenheit.
const FAHRENHEIT_REGIONS: &[&str] = &["US", "BS", "BZ", "KY", "PW"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale {
    tag: String,
}

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        // Drop encoding / modifier suffixes ("ja_JP.UTF-8", "de_DE@euro")
        let tag = tag
            .split(['.', '@'])
            .next()
            .unwrap_or_default()
            .to_string();
        Self { tag }
    }

    /// Locale from `LC_ALL` / `LANG`, falling back to `en`.
    pub fn system() -> Self {
        std::env::var("LC_ALL")
            .ok()
            .filter(|v| !v.is_empty() && v != "C" && v != "POSIX")
            .or_else(|| std::env::var("LANG").ok())
            .filter(|v| !v.is_empty() && v != "C" && v != "POSIX")
            .map(Self::new)
            .unwrap_or_else(|| Self::new("en"))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Lower-cased language subtag, e.g. `ja`.
    pub fn language(&self) -> String {
        self.tag
            .split(['_', '-'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Upper-cased two-letter region subtag, if any.
    pub fn region(&self) -> Option<String> {
        self.tag
            .split(['_', '-'])
            .skip(1)
            .find(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
            .map(str::to_ascii_uppercase)
    }

    /// Whether Japanese text should be preferred.
    pub fn is_japanese(&self) -> bool {
        self.language() == "ja" || self.region().as_deref() == Some("JP")
    }

    pub fn prefers_fahrenheit(&self) -> bool {
        self.region()
            .map(|r| FAHRENHEIT_REGIONS.contains(&r.as_str()))
            .unwrap_or(false)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en")
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_posix_tag() {
        let locale = Locale::new("ja_JP.UTF-8");
        assert_eq!(locale.tag(), "ja_JP");
        assert_eq!(locale.language(), "ja");
        assert_eq!(locale.region().as_deref(), Some("JP"));
        assert!(locale.is_japanese());
    }

    #[test]
    fn parses_bcp47_tag() {
        let locale = Locale::new("en-US");
        assert_eq!(locale.language(), "en");
        assert_eq!(locale.region().as_deref(), Some("US"));
        assert!(!locale.is_japanese());
        assert!(locale.prefers_fahrenheit());
    }

    #[test]
    fn japan_region_counts_as_japanese() {
        assert!(Locale::new("en_JP").is_japanese());
    }

    #[test]
    fn script_subtag_is_not_a_region() {
        let locale = Locale::new("zh-Hant-TW");
        assert_eq!(locale.region().as_deref(), Some("TW"));
        assert!(!locale.prefers_fahrenheit());
    }

    #[test]
    fn bare_language_has_no_region() {
        assert_eq!(Locale::new("de").region(), None);
        assert!(!Locale::default().prefers_fahrenheit());
    }
}
