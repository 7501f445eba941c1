//! Time and flag text formatting.

use crate::location::CountryCode;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Shown when there is no usable country code.
pub const GLOBE: &str = "\u{1F310}";

/// Offset from an ASCII uppercase letter to its regional indicator symbol.
const REGIONAL_INDICATOR_OFFSET: u32 = 127397;

/// 24-hour `HH:MM` in the given zone. Independent of the host locale.
pub fn format_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// `HH:MM` → `HHMM`, for badges and the icon.
pub fn compact_time(time: &str) -> String {
    time.replace(':', "")
}

/// Regional-indicator flag for a raw code, or the globe.
pub fn flag_glyph(raw: &str) -> String {
    match CountryCode::parse(raw) {
        Some(code) => country_flag(code),
        None => GLOBE.to_string(),
    }
}

/// Flag for an already validated code; the globe for unknown.
pub fn country_flag(code: CountryCode) -> String {
    if !code.is_known() {
        return GLOBE.to_string();
    }
    code.as_str()
        .chars()
        .filter_map(|c| char::from_u32(c as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect()
}

/// Lowercase CDN key for a raw code, `None` unless exactly two ASCII letters.
pub fn flag_image_key(raw: &str) -> Option<String> {
    CountryCode::parse(raw).and_then(|code| code.lowercase())
}
