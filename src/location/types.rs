//! Core types for the location subsystem.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// ISO 3166-1 alpha-2 country code, or the explicit "unknown" marker.
///
/// A known code is always two uppercase ASCII letters. Anything else that
/// comes in from storage or a provider collapses to [`CountryCode::UNKNOWN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CountryCode(Option<[u8; 2]>);

impl CountryCode {
    pub const UNKNOWN: CountryCode = CountryCode(None);

    /// Parse a two-letter code, case-insensitively. Returns `None` for
    /// anything that is not exactly two ASCII letters.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Some(CountryCode(Some([a.to_ascii_uppercase(), b.to_ascii_uppercase()])))
            }
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.0.is_some()
    }

    /// Uppercase code, or `"unknown"`.
    pub fn as_str(&self) -> &str {
        match &self.0 {
            Some(bytes) => std::str::from_utf8(bytes).unwrap_or("unknown"),
            None => "unknown",
        }
    }

    /// Lowercase code for CDN keys, `None` when unknown.
    pub fn lowercase(&self) -> Option<String> {
        self.0.map(|_| self.as_str().to_ascii_lowercase())
    }
}

impl Default for CountryCode {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CountryCode {
    fn from(raw: String) -> Self {
        CountryCode::parse(&raw).unwrap_or(CountryCode::UNKNOWN)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.as_str().to_string()
    }
}

/// The single long-lived record the clock runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationState {
    pub time_zone: Tz,
    pub country_code: CountryCode,
    pub last_sync: Option<DateTime<Utc>>,
}

impl LocationState {
    pub fn new(time_zone: Tz, country_code: CountryCode) -> Self {
        Self {
            time_zone,
            country_code,
            last_sync: None,
        }
    }

    /// Overlay a stored record onto these defaults. Fields missing from the
    /// record, or holding an unknown zone, keep their default value.
    pub fn merge_stored(mut self, stored: StoredState) -> Self {
        if let Some(name) = stored.time_zone {
            match name.parse::<Tz>() {
                Ok(tz) => self.time_zone = tz,
                Err(_) => warn!("ignoring stored timezone '{}': not an IANA zone", name),
            }
        }
        if let Some(code) = stored.country_code {
            self.country_code = code;
        }
        if let Some(ms) = stored.last_sync {
            self.last_sync = Utc.timestamp_millis_opt(ms).single();
        }
        self
    }
}

/// On-disk shape of [`LocationState`]. `lastSync` is epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub country_code: Option<CountryCode>,
    #[serde(default)]
    pub last_sync: Option<i64>,
}

impl From<&LocationState> for StoredState {
    fn from(state: &LocationState) -> Self {
        Self {
            time_zone: Some(state.time_zone.name().to_string()),
            country_code: Some(state.country_code),
            last_sync: state.last_sync.map(|t| t.timestamp_millis()),
        }
    }
}

/// What a single provider reported. At least one field is always set.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLocation {
    pub time_zone: Option<Tz>,
    pub country_code: Option<CountryCode>,
}

impl ProviderLocation {
    /// Validate raw provider fields. Invalid values are dropped one by one;
    /// a payload left with neither field is an invalid response.
    pub fn from_raw(time_zone: Option<&str>, country_code: Option<&str>) -> Result<Self, LocationError> {
        let tz = time_zone.and_then(|name| name.parse::<Tz>().ok());
        let cc = country_code.and_then(CountryCode::parse);
        if tz.is_none() && cc.is_none() {
            return Err(LocationError::InvalidResponse(format!(
                "no usable timezone or country code (timezone={:?}, country_code={:?})",
                time_zone, country_code
            )));
        }
        Ok(Self {
            time_zone: tz,
            country_code: cc,
        })
    }
}

/// What to do with the country code when every provider fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    RetainLastKnown,
    ResetUnknown,
}

/// Location provider errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider answered with HTTP {0}")]
    Status(u16),
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
    #[error("provider reported an unsuccessful lookup: {0}")]
    Unsuccessful(String),
}
