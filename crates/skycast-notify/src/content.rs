//! Notification titles and bodies (English and Japanese).

use serde::{Deserialize, Serialize};

use skycast_core::Locale;
use skycast_weather::{DailyForecast, ForecastSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// Content for the primary rule, describing tomorrow.
pub fn reminder(name: &str, snapshot: Option<&ForecastSnapshot>, locale: &Locale) -> NotificationContent {
    let jp = locale.is_japanese();
    NotificationContent {
        title: pick(jp, "天気の通知", "Weather Reminder"),
        body: body(name, snapshot.and_then(ForecastSnapshot::tomorrow), locale)
            .unwrap_or_else(|| pick(jp, "天気のリマインダー", "Weather reminder")),
    }
}

/// Content for the today slot, describing today.
pub fn today(name: &str, snapshot: Option<&ForecastSnapshot>, locale: &Locale) -> NotificationContent {
    let jp = locale.is_japanese();
    NotificationContent {
        title: pick(jp, "本日の天気", "Today's Weather"),
        body: body(name, snapshot.and_then(ForecastSnapshot::today), locale).unwrap_or_else(|| {
            pick(jp, "本日の天気のリマインダー", "Reminder for today's weather")
        }),
    }
}

/// Content for the tomorrow slot, describing tomorrow.
pub fn tomorrow(name: &str, snapshot: Option<&ForecastSnapshot>, locale: &Locale) -> NotificationContent {
    let jp = locale.is_japanese();
    NotificationContent {
        title: pick(jp, "明日の天気", "Tomorrow's Weather"),
        body: body(name, snapshot.and_then(ForecastSnapshot::tomorrow), locale)
            .unwrap_or_else(|| pick(jp, "天気のリマインダー", "Weather reminder")),
    }
}

fn pick(jp: bool, ja: &str, en: &str) -> String {
    (if jp { ja } else { en }).to_string()
}

/// "<name>: <desc> High <max>°C / Low <min>°C", temperatures truncated.
fn body(name: &str, day: Option<&DailyForecast>, locale: &Locale) -> Option<String> {
    let day = day?;
    let desc = day.condition().description(locale);
    let max = day.temperature_max.trunc() as i64;
    let min = day.temperature_min.trunc() as i64;
    Some(if locale.is_japanese() {
        format!("{}：{} 最高{}℃ / 最低{}℃", name, desc, max, min)
    } else {
        format!("{}: {} High {}°C / Low {}°C", name, desc, max, min)
    })
}
