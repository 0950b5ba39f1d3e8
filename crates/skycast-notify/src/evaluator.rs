//! Decide whether a rule fires and when.
//!
//! Everything here is pure: the same rule, snapshot and `now` always give
//! the same plans. A missing snapshot means "condition not met".

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::rule::{NotificationRule, RuleKind};
use crate::trigger::{FireSpec, Slot};
use skycast_weather::{is_rain_like, ForecastSnapshot};

/// A trigger the scheduler should register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPlan {
    pub slot: Slot,
    pub fire: FireSpec,
    pub repeats: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub condition_met: bool,
    pub plans: Vec<TriggerPlan>,
}

/// Whether the rule's forecast condition holds. Unconditional kinds always do.
pub fn condition_met(rule: &NotificationRule, snapshot: Option<&ForecastSnapshot>) -> bool {
    if !rule.kind.is_conditional() {
        return true;
    }
    let Some(tomorrow) = snapshot.and_then(ForecastSnapshot::tomorrow) else {
        return false;
    };
    match (rule.kind, rule.threshold()) {
        (RuleKind::NextRainyDay, _) => is_rain_like(tomorrow.weather_code),
        (RuleKind::TempAtOrAbove, Some(threshold)) => tomorrow.temperature_max >= threshold,
        (RuleKind::TempAtOrBelow, Some(threshold)) => tomorrow.temperature_min <= threshold,
        _ => false,
    }
}

/// Next hour:minute strictly after `now`: today if still ahead, else tomorrow.
pub fn next_occurrence(hour: u32, minute: u32, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.date().and_time(time);
    if today > now {
        Some(today)
    } else {
        Some(today + Duration::days(1))
    }
}

pub fn evaluate(
    rule: &NotificationRule,
    snapshot: Option<&ForecastSnapshot>,
    now: NaiveDateTime,
) -> Evaluation {
    let condition_met = condition_met(rule, snapshot);
    if !condition_met {
        return Evaluation {
            condition_met,
            plans: Vec::new(),
        };
    }

    let plans = match rule.kind {
        RuleKind::Daily => vec![TriggerPlan {
            slot: Slot::Primary,
            fire: FireSpec::daily(rule.hour, rule.minute),
            repeats: true,
        }],
        RuleKind::Weekly => rule
            .weekdays
            .iter()
            .flatten()
            .filter(|day| (1..=7).contains(*day))
            .map(|&day| TriggerPlan {
                slot: Slot::Weekday(day),
                fire: FireSpec::weekly(day, rule.hour, rule.minute),
                repeats: true,
            })
            .collect(),
        RuleKind::OneTime
        | RuleKind::NextRainyDay
        | RuleKind::TempAtOrAbove
        | RuleKind::TempAtOrBelow => next_occurrence(rule.hour, rule.minute, now)
            .map(|at| TriggerPlan {
                slot: Slot::Primary,
                fire: FireSpec::at(at),
                repeats: false,
            })
            .into_iter()
            .collect(),
    };

    Evaluation {
        condition_met,
        plans,
    }
}

/// One-shot plan for the today/tomorrow slots.
///
/// Both fire today at hour:minute; `None` when that time is not after `now`
/// or `slot` is not a day slot.
pub fn day_slot_plan(slot: Slot, hour: u32, minute: u32, now: NaiveDateTime) -> Option<TriggerPlan> {
    if !slot.is_day_slot() {
        return None;
    }
    let at = now.date().and_time(NaiveTime::from_hms_opt(hour, minute, 0)?);
    (at > now).then_some(TriggerPlan {
        slot,
        fire: FireSpec::at(at),
        repeats: false,
    })
}
