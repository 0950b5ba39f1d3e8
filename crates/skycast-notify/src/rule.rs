//! Per-location notification rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use skycast_core::NotificationConfig;

/// Threshold used by `TempAtOrAbove` when none is set (°C).
pub const DEFAULT_HOT_THRESHOLD: f64 = 30.0;
/// Threshold used by `TempAtOrBelow` when none is set (°C).
pub const DEFAULT_COLD_THRESHOLD: f64 = 5.0;

const DEFAULT_SLOT_HOUR: u32 = 9;

/// When, or under which forecast condition, a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Once, at the next hour:minute
    OneTime,
    /// Every day at hour:minute
    Daily,
    /// On each selected weekday at hour:minute
    Weekly,
    /// Once, if tomorrow looks rainy
    NextRainyDay,
    /// Once, if tomorrow's high reaches the threshold
    TempAtOrAbove,
    /// Once, if tomorrow's low drops to the threshold
    TempAtOrBelow,
}

impl RuleKind {
    /// Whether the rule depends on forecast data.
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            Self::NextRainyDay | Self::TempAtOrAbove | Self::TempAtOrBelow
        )
    }

    pub fn default_threshold(self) -> Option<f64> {
        match self {
            Self::TempAtOrAbove => Some(DEFAULT_HOT_THRESHOLD),
            Self::TempAtOrBelow => Some(DEFAULT_COLD_THRESHOLD),
            _ => None,
        }
    }
}

/// One-shot "today" or "tomorrow" reminder layered on top of the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlot {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_slot_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

fn default_slot_hour() -> u32 {
    DEFAULT_SLOT_HOUR
}

impl Default for DaySlot {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: DEFAULT_SLOT_HOUR,
            minute: 0,
        }
    }
}

impl DaySlot {
    pub fn at(hour: u32, minute: u32) -> Self {
        Self {
            enabled: true,
            hour,
            minute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("hour {0} is out of range (0-23)")]
    InvalidHour(u32),
    #[error("minute {0} is out of range (0-59)")]
    InvalidMinute(u32),
    #[error("weekly rules need at least one weekday")]
    MissingWeekdays,
    #[error("weekday {0} is out of range (1 = Sunday ... 7 = Saturday)")]
    InvalidWeekday(u8),
    #[error("weekdays are only allowed on weekly rules")]
    UnexpectedWeekdays,
    #[error("temperature threshold must be a finite number")]
    InvalidThreshold,
    #[error("a temperature threshold is only allowed on temperature rules")]
    UnexpectedThreshold,
    #[error("{slot} reminder time {hour}:{minute:02} is invalid")]
    InvalidSlotTime {
        slot: &'static str,
        hour: u32,
        minute: u32,
    },
}

/// A location's notification settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub kind: RuleKind,

    /// 1 = Sunday ... 7 = Saturday; present only for `Weekly`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<BTreeSet<u8>>,

    pub hour: u32,
    pub minute: u32,

    /// °C; falls back to the kind's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_threshold: Option<f64>,

    #[serde(default)]
    pub today: DaySlot,

    #[serde(default)]
    pub tomorrow: DaySlot,
}

impl Default for NotificationRule {
    /// Daily at 20:00.
    fn default() -> Self {
        Self::new(RuleKind::Daily, 20, 0)
    }
}

impl NotificationRule {
    pub fn new(kind: RuleKind, hour: u32, minute: u32) -> Self {
        Self {
            kind,
            weekdays: None,
            hour,
            minute,
            temperature_threshold: None,
            today: DaySlot::default(),
            tomorrow: DaySlot::default(),
        }
    }

    /// Daily rule at the configured default time.
    pub fn default_from(config: &NotificationConfig) -> Self {
        Self::new(RuleKind::Daily, config.default_hour, config.default_minute)
    }

    pub fn weekly(weekdays: impl IntoIterator<Item = u8>, hour: u32, minute: u32) -> Self {
        Self {
            weekdays: Some(weekdays.into_iter().collect()),
            ..Self::new(RuleKind::Weekly, hour, minute)
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.temperature_threshold = Some(threshold);
        self
    }

    pub fn with_today(mut self, slot: DaySlot) -> Self {
        self.today = slot;
        self
    }

    pub fn with_tomorrow(mut self, slot: DaySlot) -> Self {
        self.tomorrow = slot;
        self
    }

    /// Effective threshold for the temperature kinds.
    pub fn threshold(&self) -> Option<f64> {
        self.kind
            .default_threshold()
            .map(|default| self.temperature_threshold.unwrap_or(default))
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), RuleError> {
        check_time(self.hour, self.minute)?;

        match (self.kind, &self.weekdays) {
            (RuleKind::Weekly, None) => return Err(RuleError::MissingWeekdays),
            (RuleKind::Weekly, Some(days)) if days.is_empty() => {
                return Err(RuleError::MissingWeekdays)
            }
            (RuleKind::Weekly, Some(days)) => {
                if let Some(&bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
                    return Err(RuleError::InvalidWeekday(bad));
                }
            }
            (_, Some(_)) => return Err(RuleError::UnexpectedWeekdays),
            (_, None) => {}
        }

        if let Some(threshold) = self.temperature_threshold {
            if self.kind.default_threshold().is_none() {
                return Err(RuleError::UnexpectedThreshold);
            }
            if !threshold.is_finite() {
                return Err(RuleError::InvalidThreshold);
            }
        }

        for (name, slot) in [("today", &self.today), ("tomorrow", &self.tomorrow)] {
            if check_time(slot.hour, slot.minute).is_err() {
                return Err(RuleError::InvalidSlotTime {
                    slot: name,
                    hour: slot.hour,
                    minute: slot.minute,
                });
            }
        }
        Ok(())
    }
}

fn check_time(hour: u32, minute: u32) -> Result<(), RuleError> {
    if hour > 23 {
        return Err(RuleError::InvalidHour(hour));
    }
    if minute > 59 {
        return Err(RuleError::InvalidMinute(minute));
    }
    Ok(())
}
