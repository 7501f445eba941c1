use crate::clock::flags::DEFAULT_FLAG_CDN;
use crate::clock::{FlagStyle, Rgb};
use crate::error::GeoclockError;
use crate::location::{FailurePolicy, JsonFileStore, ProviderKind};

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    storage_path: Option<PathBuf>,
    providers: Option<Vec<ProviderKind>>,
    provider_timeout_secs: Option<u64>,
    resolve_interval_secs: Option<u64>,
    render_interval_secs: Option<u64>,
    flag_style: Option<FlagStyle>,
    flag_cdn: Option<String>,
    failure_policy: Option<FailurePolicy>,
    locale: Option<String>,
    icon_dir: Option<PathBuf>,
    query_addr: Option<SocketAddr>,
    badge_background: Option<String>,
    badge_text_color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    pub providers: Vec<ProviderKind>,
    pub provider_timeout: Duration,
    pub resolve_interval: Duration,
    pub render_interval: Duration,
    pub flag_style: FlagStyle,
    pub flag_cdn: String,
    pub failure_policy: FailurePolicy,
    pub locale: Option<String>,
    pub icon_dir: Option<PathBuf>,
    pub query_addr: SocketAddr,
    pub badge_background: Rgb,
    pub badge_text_color: Rgb,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: JsonFileStore::default_path(),
            providers: vec![ProviderKind::IpApiCo, ProviderKind::IpWhoIs],
            provider_timeout: Duration::from_secs(5),
            resolve_interval: Duration::from_secs(6 * 60 * 60),
            render_interval: Duration::from_secs(1),
            flag_style: FlagStyle::Glyph,
            flag_cdn: DEFAULT_FLAG_CDN.to_string(),
            failure_policy: FailurePolicy::RetainLastKnown,
            locale: None,
            icon_dir: None,
            query_addr: SocketAddr::from(([127, 0, 0, 1], 8734)),
            badge_background: Rgb::new(0x1f, 0x29, 0x37),
            badge_text_color: Rgb::new(0xff, 0xff, 0xff),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geoclock")
        .join("config.toml")
}

/// Read the config at `path`. A missing file yields the defaults.
pub fn parse_config<P>(path: P) -> Result<Config, GeoclockError>
where
    P: AsRef<Path>,
{
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_config_str(&contents),
        Err(_) => Ok(Config::default()),
    }
}

pub fn parse_config_str(contents: &str) -> Result<Config, GeoclockError> {
    let mut config = Config::default();
    let parsed: ConfigFile = toml::from_str(contents)?;

    if let Some(v) = parsed.storage_path {
        config.storage_path = v;
    }
    if let Some(v) = parsed.providers {
        config.providers = v;
    }
    if let Some(v) = parsed.provider_timeout_secs {
        config.provider_timeout = nonzero_secs("provider_timeout_secs", v)?;
    }
    if let Some(v) = parsed.resolve_interval_secs {
        config.resolve_interval = nonzero_secs("resolve_interval_secs", v)?;
    }
    if let Some(v) = parsed.render_interval_secs {
        config.render_interval = nonzero_secs("render_interval_secs", v)?;
    }
    if let Some(v) = parsed.flag_style {
        config.flag_style = v;
    }
    if let Some(v) = parsed.flag_cdn {
        config.flag_cdn = v;
    }
    if let Some(v) = parsed.failure_policy {
        config.failure_policy = v;
    }
    config.locale = parsed.locale;
    config.icon_dir = parsed.icon_dir;
    if let Some(v) = parsed.query_addr {
        config.query_addr = v;
    }
    if let Some(v) = parsed.badge_background {
        config.badge_background = color("badge_background", &v)?;
    }
    if let Some(v) = parsed.badge_text_color {
        config.badge_text_color = color("badge_text_color", &v)?;
    }
    Ok(config)
}

/// Upper bound for every interval and timeout: one year.
const MAX_SECS: u64 = 365 * 24 * 60 * 60;

fn nonzero_secs(key: &'static str, secs: u64) -> Result<Duration, GeoclockError> {
    if secs == 0 {
        return Err(GeoclockError::InvalidConfig {
            key,
            reason: "must be at least 1 second".into(),
        });
    }
    if secs > MAX_SECS {
        return Err(GeoclockError::InvalidConfig {
            key,
            reason: format!("must be at most {} seconds", MAX_SECS),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn color(key: &'static str, hex: &str) -> Result<Rgb, GeoclockError> {
    Rgb::from_hex(hex).ok_or_else(|| GeoclockError::InvalidConfig {
        key,
        reason: format!("'{}' is not a #rrggbb color", hex),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = parse_config(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.providers, vec![ProviderKind::IpApiCo, ProviderKind::IpWhoIs]);
        assert_eq!(config.resolve_interval, Duration::from_secs(21600));
        assert_eq!(config.render_interval, Duration::from_secs(1));
        assert_eq!(config.flag_style, FlagStyle::Glyph);
        assert_eq!(config.failure_policy, FailurePolicy::RetainLastKnown);
    }

    #[test]
    fn test_overrides() {
        let config = parse_config_str(
            r##"
            providers = ["ipwho", "ip-api"]
            flag_style = "image"
            failure_policy = "reset-unknown"
            resolve_interval_secs = 3600
            query_addr = "0.0.0.0:9000"
            locale = "sv_SE"
            badge_background = "#000000"
            "##,
        )
        .unwrap();
        assert_eq!(config.providers, vec![ProviderKind::IpWhoIs, ProviderKind::IpApiCom]);
        assert_eq!(config.flag_style, FlagStyle::Image);
        assert_eq!(config.failure_policy, FailurePolicy::ResetUnknown);
        assert_eq!(config.resolve_interval, Duration::from_secs(3600));
        assert_eq!(config.query_addr.port(), 9000);
        assert_eq!(config.locale.as_deref(), Some("sv_SE"));
        assert_eq!(config.badge_background, Rgb::new(0, 0, 0));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            parse_config_str("render_interval_secs = 0"),
            Err(GeoclockError::InvalidConfig { key: "render_interval_secs", .. })
        ));
        assert!(matches!(
            parse_config_str("resolve_interval_secs = 9223372036854775807"),
            Err(GeoclockError::InvalidConfig { key: "resolve_interval_secs", .. })
        ));
        assert!(matches!(
            parse_config_str("render_interval_secs = 31536001"),
            Err(GeoclockError::InvalidConfig { key: "render_interval_secs", .. })
        ));
        assert!(parse_config_str("resolve_interval_secs = 31536000").is_ok());
        assert!(matches!(
            parse_config_str("badge_text_color = \"white\""),
            Err(GeoclockError::InvalidConfig { .. })
        ));
        assert!(matches!(
            parse_config_str("providers = [\"geoip\"]"),
            Err(GeoclockError::ConfigFileParsingError(_))
        ));
        assert!(parse_config_str("colour = 1").is_err());
    }
}
