//! IP geolocation providers: ipapi.co, ipwho.is and ip-api.com.
//!
//! Each provider is one GET with no retry. A non-2xx status, a transport
//! error, an unparseable body or the provider's own failure flag are all
//! errors; the resolver moves on to the next provider.

use super::types::{LocationError, ProviderLocation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const USER_AGENT: &str = concat!("geoclock/", env!("CARGO_PKG_VERSION"));

pub trait LocationProvider: Send + Sync {
    fn name(&self) -> &str;
    fn locate(&self) -> Result<ProviderLocation, LocationError>;
}

/// The built-in providers, as named in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "ipapi")]
    IpApiCo,
    #[serde(rename = "ipwho")]
    IpWhoIs,
    #[serde(rename = "ip-api")]
    IpApiCom,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpApiCo => write!(f, "ipapi"),
            Self::IpWhoIs => write!(f, "ipwho"),
            Self::IpApiCom => write!(f, "ip-api"),
        }
    }
}

impl ProviderKind {
    pub fn build(self, agent: ureq::Agent) -> Box<dyn LocationProvider> {
        match self {
            Self::IpApiCo => Box::new(HttpProvider::<IpApiCoBody>::new(self, "https://ipapi.co/json/", agent)),
            Self::IpWhoIs => Box::new(HttpProvider::<IpWhoIsBody>::new(self, "https://ipwho.is/", agent)),
            Self::IpApiCom => Box::new(HttpProvider::<IpApiComBody>::new(self, "http://ip-api.com/json/", agent)),
        }
    }
}

/// Shared HTTP agent with a per-request timeout.
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// GET `url` and decode the JSON body.
pub fn fetch_json<T: DeserializeOwned>(agent: &ureq::Agent, url: &str) -> Result<T, LocationError> {
    let response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => LocationError::Status(code),
        ureq::Error::Transport(t) => LocationError::Network(t.to_string()),
    })?;
    response
        .into_json()
        .map_err(|e| LocationError::InvalidResponse(e.to_string()))
}

/// A provider response body that knows how to judge itself.
pub trait ProviderBody: DeserializeOwned {
    fn into_location(self) -> Result<ProviderLocation, LocationError>;
}

pub struct HttpProvider<B> {
    name: String,
    url: String,
    agent: ureq::Agent,
    _body: std::marker::PhantomData<fn() -> B>,
}

impl<B: ProviderBody> HttpProvider<B> {
    pub fn new(kind: ProviderKind, url: &str, agent: ureq::Agent) -> Self {
        Self {
            name: kind.to_string(),
            url: url.to_string(),
            agent,
            _body: std::marker::PhantomData,
        }
    }
}

impl<B: ProviderBody> LocationProvider for HttpProvider<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self) -> Result<ProviderLocation, LocationError> {
        fetch_json::<B>(&self.agent, &self.url)?.into_location()
    }
}

// ─── ipapi.co ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct IpApiCoBody {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    timezone: Option<String>,
    country_code: Option<String>,
}

impl ProviderBody for IpApiCoBody {
    fn into_location(self) -> Result<ProviderLocation, LocationError> {
        if self.error {
            return Err(LocationError::Unsuccessful(
                self.reason.unwrap_or_else(|| "error flag set".into()),
            ));
        }
        ProviderLocation::from_raw(self.timezone.as_deref(), self.country_code.as_deref())
    }
}

// ─── ipwho.is ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct IpWhoIsBody {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    timezone: Option<IpWhoIsTimezone>,
    country_code: Option<String>,
}

#[derive(Deserialize)]
struct IpWhoIsTimezone {
    id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ProviderBody for IpWhoIsBody {
    fn into_location(self) -> Result<ProviderLocation, LocationError> {
        if !self.success {
            return Err(LocationError::Unsuccessful(
                self.message.unwrap_or_else(|| "success: false".into()),
            ));
        }
        let tz = self.timezone.and_then(|t| t.id);
        ProviderLocation::from_raw(tz.as_deref(), self.country_code.as_deref())
    }
}

// ─── ip-api.com ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpApiComBody {
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    timezone: Option<String>,
    country_code: Option<String>,
}

impl ProviderBody for IpApiComBody {
    fn into_location(self) -> Result<ProviderLocation, LocationError> {
        if self.status.as_deref() != Some("success") {
            return Err(LocationError::Unsuccessful(
                self.message.unwrap_or_else(|| format!("status {:?}", self.status)),
            ));
        }
        ProviderLocation::from_raw(self.timezone.as_deref(), self.country_code.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<B: ProviderBody>(json: &str) -> Result<ProviderLocation, LocationError> {
        serde_json::from_str::<B>(json).unwrap().into_location()
    }

    #[test]
    fn test_ipapi_co_success() {
        let loc = parse::<IpApiCoBody>(
            r#"{"ip":"1.2.3.4","city":"Paris","timezone":"Europe/Paris","country_code":"FR","utc_offset":"+0100"}"#,
        )
        .unwrap();
        assert_eq!(loc.time_zone, Some(chrono_tz::Europe::Paris));
        assert_eq!(loc.country_code.unwrap().as_str(), "FR");
    }

    #[test]
    fn test_ipapi_co_error_flag() {
        let err = parse::<IpApiCoBody>(r#"{"error":true,"reason":"RateLimited"}"#).unwrap_err();
        assert!(matches!(err, LocationError::Unsuccessful(ref r) if r == "RateLimited"));
    }

    #[test]
    fn test_ipwho_nested_timezone() {
        let loc = parse::<IpWhoIsBody>(
            r#"{"success":true,"country_code":"in","timezone":{"id":"Asia/Kolkata","utc":"+05:30"}}"#,
        )
        .unwrap();
        assert_eq!(loc.time_zone, Some(chrono_tz::Asia::Kolkata));
        assert_eq!(loc.country_code.unwrap().as_str(), "IN");
    }

    #[test]
    fn test_ipwho_unsuccessful() {
        let err = parse::<IpWhoIsBody>(r#"{"success":false,"message":"Reserved range"}"#).unwrap_err();
        assert!(matches!(err, LocationError::Unsuccessful(_)));
    }

    #[test]
    fn test_ip_api_com() {
        let loc = parse::<IpApiComBody>(
            r#"{"status":"success","countryCode":"JP","timezone":"Asia/Tokyo"}"#,
        )
        .unwrap();
        assert_eq!(loc.time_zone, Some(chrono_tz::Asia::Tokyo));

        let err = parse::<IpApiComBody>(r#"{"status":"fail","message":"private range"}"#).unwrap_err();
        assert!(matches!(err, LocationError::Unsuccessful(_)));
    }

    #[test]
    fn test_body_without_usable_fields() {
        let err = parse::<IpApiCoBody>(r#"{"timezone":"Not/AZone","country_code":"XYZ"}"#).unwrap_err();
        assert!(matches!(err, LocationError::InvalidResponse(_)));
    }

    #[test]
    fn test_provider_kind_names() {
        let kinds: Vec<ProviderKind> = serde_json::from_str(r#"["ipapi","ipwho","ip-api"]"#).unwrap();
        assert_eq!(kinds, vec![ProviderKind::IpApiCo, ProviderKind::IpWhoIs, ProviderKind::IpApiCom]);
        assert_eq!(ProviderKind::IpWhoIs.to_string(), "ipwho");
    }

    #[test]
    fn test_build_uses_kind_name() {
        let provider = ProviderKind::IpApiCom.build(build_agent(Duration::from_secs(1)));
        assert_eq!(provider.name(), "ip-api");
    }
}
