//! Host locale defaults: the local IANA zone and the UI-language region.
//!
//! Only used before anything has been resolved or persisted.

use super::types::{CountryCode, LocationState};
use chrono_tz::Tz;
use std::env;
use std::fs;
use std::path::Path;

pub trait HostLocale {
    /// UI language tag, e.g. `fr-FR` or `en_GB.UTF-8`.
    fn ui_language(&self) -> Option<String>;

    /// Name of the host's local zone, not yet validated.
    fn time_zone_name(&self) -> Option<String>;
}

/// Reads the locale from the environment and the tz files under /etc.
pub struct SystemLocale {
    language_override: Option<String>,
}

impl SystemLocale {
    pub fn new(language_override: Option<String>) -> Self {
        Self { language_override }
    }
}

impl HostLocale for SystemLocale {
    fn ui_language(&self) -> Option<String> {
        if let Some(lang) = &self.language_override {
            return Some(lang.clone());
        }
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find(|v| !v.is_empty())
    }

    fn time_zone_name(&self) -> Option<String> {
        if let Ok(tz) = env::var("TZ") {
            let tz = tz.trim_start_matches(':').trim();
            if !tz.is_empty() {
                return Some(tz.to_string());
            }
        }
        if let Ok(contents) = fs::read_to_string("/etc/timezone") {
            let tz = contents.trim();
            if !tz.is_empty() {
                return Some(tz.to_string());
            }
        }
        fs::read_link("/etc/localtime")
            .ok()
            .and_then(|target| zone_from_localtime_path(&target))
    }
}

/// `/usr/share/zoneinfo/Europe/Paris` → `Europe/Paris`
pub fn zone_from_localtime_path(target: &Path) -> Option<String> {
    let target = target.to_str()?;
    let (_, zone) = target.split_once("zoneinfo/")?;
    let zone = zone.trim_start_matches("posix/").trim_start_matches("right/");
    if zone.is_empty() {
        None
    } else {
        Some(zone.to_string())
    }
}

/// Trailing two-letter region subtag of a language tag.
///
/// `en-US` → US, `fr_CA.UTF-8` → CA, `de_DE@euro` → DE, `en` → unknown.
pub fn region_from_language(language: &str) -> CountryCode {
    let tag = language
        .split(['.', '@'])
        .next()
        .unwrap_or_default();
    let parts: Vec<&str> = tag.split(['-', '_']).collect();
    if parts.len() < 2 {
        return CountryCode::UNKNOWN;
    }
    parts
        .last()
        .and_then(|region| CountryCode::parse(region))
        .unwrap_or(CountryCode::UNKNOWN)
}

/// The host's zone, or UTC when it is missing or not an IANA name.
pub fn default_time_zone(host: &dyn HostLocale) -> Tz {
    host.time_zone_name()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::UTC)
}

pub fn locale_country(host: &dyn HostLocale) -> CountryCode {
    host.ui_language()
        .map(|lang| region_from_language(&lang))
        .unwrap_or(CountryCode::UNKNOWN)
}

/// Initial state for a process that has nothing persisted yet.
pub fn default_state(host: &dyn HostLocale) -> LocationState {
    LocationState::new(default_time_zone(host), locale_country(host))
}
