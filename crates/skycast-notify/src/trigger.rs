//! Trigger slots, fire-time components and request identifiers.
//!
//! Identifiers are `forecast.reminder.<location>` for the primary rule,
//! with `.w<weekday>`, `.today` or `.tomorrow` appended for the other slots.
//! `cancel_all` and `is_scheduled` depend on this scheme.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use skycast_weather::LocationId;

pub const IDENTIFIER_PREFIX: &str = "forecast.reminder";

/// One independent trigger identity attached to a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    Primary,
    /// 1 = Sunday ... 7 = Saturday
    Weekday(u8),
    Today,
    Tomorrow,
}

impl Slot {
    /// Slots owned by the rule itself (cleared on every reconcile).
    pub fn rule_slots() -> impl Iterator<Item = Slot> {
        std::iter::once(Slot::Primary).chain((1..=7).map(Slot::Weekday))
    }

    /// Every slot a location can have.
    pub fn all() -> impl Iterator<Item = Slot> {
        Self::rule_slots().chain([Slot::Today, Slot::Tomorrow])
    }

    pub fn is_day_slot(self) -> bool {
        matches!(self, Slot::Today | Slot::Tomorrow)
    }
}

pub fn identifier(location_id: LocationId, slot: Slot) -> String {
    let base = format!("{}.{}", IDENTIFIER_PREFIX, location_id);
    match slot {
        Slot::Primary => base,
        Slot::Weekday(day) => format!("{}.w{}", base, day),
        Slot::Today => format!("{}.today", base),
        Slot::Tomorrow => format!("{}.tomorrow", base),
    }
}

pub fn all_identifiers(location_id: LocationId) -> Vec<String> {
    Slot::all().map(|slot| identifier(location_id, slot)).collect()
}

fn parse_location_id(raw: &str) -> Option<LocationId> {
    match raw {
        "current" => Some(LocationId::CurrentPosition),
        _ => raw.parse().ok().map(LocationId::City),
    }
}

/// Inverse of `identifier`. Returns `None` for foreign identifiers.
pub fn parse_identifier(raw: &str) -> Option<(LocationId, Slot)> {
    let rest = raw.strip_prefix(IDENTIFIER_PREFIX)?.strip_prefix('.')?;
    let (location, suffix) = match rest.split_once('.') {
        Some((location, suffix)) => (location, Some(suffix)),
        None => (rest, None),
    };
    let location_id = parse_location_id(location)?;
    let slot = match suffix {
        None => Slot::Primary,
        Some("today") => Slot::Today,
        Some("tomorrow") => Slot::Tomorrow,
        Some(other) => {
            let day: u8 = other.strip_prefix('w')?.parse().ok()?;
            if !(1..=7).contains(&day) {
                return None;
            }
            Slot::Weekday(day)
        }
    };
    Some((location_id, slot))
}

/// Calendar components a trigger matches, in local wall-clock time.
///
/// A spec with year/month/day fires once on that date; one with a weekday
/// matches that day every week; otherwise it matches hour:minute daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireSpec {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub weekday: Option<u8>,
    pub hour: u32,
    pub minute: u32,
}

impl FireSpec {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            year: None,
            month: None,
            day: None,
            weekday: None,
            hour,
            minute,
        }
    }

    pub fn weekly(weekday: u8, hour: u32, minute: u32) -> Self {
        Self {
            weekday: Some(weekday),
            ..Self::daily(hour, minute)
        }
    }

    /// Exactly `at` (seconds dropped).
    pub fn at(at: NaiveDateTime) -> Self {
        Self {
            year: Some(at.year()),
            month: Some(at.month()),
            day: Some(at.day()),
            ..Self::daily(at.hour(), at.minute())
        }
    }

    fn time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }

    fn date(&self) -> Option<Option<NaiveDate>> {
        match (self.year, self.month, self.day) {
            (None, None, None) => Some(None),
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d).map(Some),
            _ => None,
        }
    }

    /// Whether the components describe a real time.
    pub fn is_valid(&self) -> bool {
        self.time().is_some()
            && self.date().is_some()
            && self.weekday.map_or(true, |w| (1..=7).contains(&w))
    }

    /// First matching time strictly after `now`, if any.
    pub fn next_fire_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.is_valid() {
            return None;
        }
        let time = self.time()?;

        if let Some(date) = self.date()? {
            let at = date.and_time(time);
            return (at > now).then_some(at);
        }

        (0..=7)
            .map(|offset| now.date() + Duration::days(offset))
            .filter(|date| {
                self.weekday
                    .map_or(true, |w| date.weekday().number_from_sunday() == u32::from(w))
            })
            .map(|date| date.and_time(time))
            .find(|at| *at > now)
    }
}

/// A pending trigger as seen through its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTrigger {
    pub location_id: LocationId,
    pub slot: Slot,
    pub identifier: String,
    pub repeats: bool,
    pub fire: FireSpec,
}
