//! What-to-wear hint from current conditions.

use crate::types::{is_rain_like, CurrentConditions};
use skycast_core::Locale;

/// Wind speed at which the colder of air and apparent temperature is used.
const BREEZY: f64 = 8.0;
const WINDY: f64 = 12.0;

pub fn clothing_advice(current: &CurrentConditions, locale: &Locale) -> String {
    let jp = locale.is_japanese();
    let wind = current.wind_speed;
    let feels = if wind >= BREEZY {
        current.temperature.min(current.apparent_temperature)
    } else {
        current.apparent_temperature
    };

    let mut parts = Vec::new();
    if is_rain_like(current.weather_code) {
        parts.push(if jp { "傘を忘れずに" } else { "Bring an umbrella" });
    }

    let band = match feels {
        f if f < 0.0 => {
            if jp {
                "極寒：ダウン＋手袋・マフラー必須"
            } else {
                "Frigid: heavy down jacket, gloves & scarf"
            }
        }
        f if f < 5.0 => {
            if jp {
                "とても寒い：厚手コート＋防寒小物"
            } else {
                "Very cold: heavy coat + winter accessories"
            }
        }
        f if f < 10.0 => {
            if jp {
                "寒い：コートや厚手の上着"
            } else {
                "Cold: coat or thick outer layer"
            }
        }
        f if f < 16.0 => {
            if jp {
                "肌寒い：ライトアウター"
            } else {
                "Chilly: light jacket"
            }
        }
        f if f < 22.0 => {
            if jp {
                "快適：長袖が無難"
            } else {
                "Mild: long sleeves recommended"
            }
        }
        f if f < 28.0 => match (jp, wind >= BREEZY) {
            (true, true) => "暑め：薄手＋羽織り（風強め）",
            (true, false) => "やや暑い：薄手で快適",
            (false, true) => "Warm: lightwear + outer (windy)",
            (false, false) => "Warm: lightwear",
        },
        _ => {
            if jp {
                "猛暑：半袖＋こまめに水分補給"
            } else {
                "Hot: T-shirt, stay hydrated"
            }
        }
    };
    parts.push(band);

    if wind >= WINDY {
        parts.push(if jp {
            "風が強いので帽子や固定できる服装を"
        } else {
            "Windy: secure hats or layers"
        });
    }

    if jp {
        format!("アドバイス：{}", parts.join("／"))
    } else {
        format!("Advice: {}", parts.join(" / "))
    }
}
