//! Notifier configuration loading.
//!
//! TOML is the sole config source; no environment-variable overrides, in
//! the style of the forwarder's loader. Default path:
//! `/etc/ikdisplay/notifier.toml`.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub schema_version: u32,
    pub fabric: FabricConfig,
    pub twitter: TwitterConfig,
    pub store: StoreConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub jid: String,
    /// The bearer credential (read from `secret_file` when set, else taken
    /// from `secret` directly).
    pub secret: String,
    pub host: String,
    pub port: u16,
    /// The pub/sub peer address ("service").
    pub service: String,
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub embedly_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub ping_interval_secs: u64,
    pub reconnect_count: u32,
    pub live_page_history: usize,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    fabric: Option<RawFabric>,
    twitter: Option<RawTwitter>,
    store: Option<RawStore>,
    web: Option<RawWeb>,
    logging: Option<RawLogging>,
    limits: Option<RawLimits>,
}

#[derive(Debug, Deserialize)]
struct RawFabric {
    jid: Option<String>,
    secret: Option<String>,
    secret_file: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    service: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTwitter {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    access_token: Option<String>,
    access_token_secret: Option<String>,
    embedly_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStore {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWeb {
    bind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLogging {
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    ping_interval_secs: Option<u64>,
    reconnect_count: Option<u32>,
    live_page_history: Option<usize>,
}

pub fn load_config_from_path(path: &Path) -> Result<NotifierConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<NotifierConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/ikdisplay/notifier.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<NotifierConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let schema_version = raw.schema_version.ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!("schema_version must be 1, got {schema_version}")));
    }

    let raw_fabric = raw.fabric.ok_or_else(|| ConfigError::MissingField("fabric".to_owned()))?;
    let jid = raw_fabric.jid.ok_or_else(|| ConfigError::MissingField("fabric.jid".to_owned()))?;
    let secret = match (raw_fabric.secret, raw_fabric.secret_file) {
        (_, Some(file)) => read_secret_file(&file)?,
        (Some(secret), None) => secret,
        (None, None) => return Err(ConfigError::MissingField("fabric.secret or fabric.secret_file".to_owned())),
    };
    let host = raw_fabric.host.ok_or_else(|| ConfigError::MissingField("fabric.host".to_owned()))?;
    let port = raw_fabric.port.unwrap_or(5222);
    let service = raw_fabric.service.ok_or_else(|| ConfigError::MissingField("fabric.service".to_owned()))?;

    let raw_twitter = raw.twitter.ok_or_else(|| ConfigError::MissingField("twitter".to_owned()))?;
    let twitter = TwitterConfig {
        consumer_key: raw_twitter.consumer_key.ok_or_else(|| ConfigError::MissingField("twitter.consumer_key".to_owned()))?,
        consumer_secret: raw_twitter
            .consumer_secret
            .ok_or_else(|| ConfigError::MissingField("twitter.consumer_secret".to_owned()))?,
        access_token: raw_twitter.access_token.ok_or_else(|| ConfigError::MissingField("twitter.access_token".to_owned()))?,
        access_token_secret: raw_twitter
            .access_token_secret
            .ok_or_else(|| ConfigError::MissingField("twitter.access_token_secret".to_owned()))?,
        embedly_key: raw_twitter.embedly_key,
    };

    let store = StoreConfig {
        path: raw.store.and_then(|s| s.path).unwrap_or_else(|| "/var/lib/ikdisplay/store.json".to_owned()),
    };
    let web = WebConfig { bind: raw.web.and_then(|w| w.bind).unwrap_or_else(|| "0.0.0.0:8080".to_owned()) };
    let logging = LoggingConfig { level: raw.logging.and_then(|l| l.level).unwrap_or_else(|| "info".to_owned()) };

    let raw_limits = raw.limits.unwrap_or(RawLimits { ping_interval_secs: None, reconnect_count: None, live_page_history: None });
    let limits = LimitsConfig {
        ping_interval_secs: raw_limits.ping_interval_secs.unwrap_or(30),
        reconnect_count: raw_limits.reconnect_count.unwrap_or(2),
        live_page_history: raw_limits.live_page_history.unwrap_or(13),
    };

    Ok(NotifierConfig {
        schema_version,
        fabric: FabricConfig { jid, secret, host, port, service },
        twitter,
        store,
        web,
        logging,
        limits,
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn read_secret_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map(|s| s.trim().to_owned()).map_err(|e| ConfigError::Io(format!("reading secret file '{path}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        schema_version = 1
        [fabric]
        jid = "notifier@mediamatic.nl"
        secret = "hunter2"
        host = "mediamatic.nl"
        service = "pubsub.mediamatic.nl"
        [twitter]
        consumer_key = "k"
        consumer_secret = "ks"
        access_token = "t"
        access_token_secret = "ts"
    "#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let cfg = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(cfg.fabric.port, 5222);
        assert_eq!(cfg.limits.ping_interval_secs, 30);
        assert_eq!(cfg.limits.reconnect_count, 2);
        assert_eq!(cfg.limits.live_page_history, 13);
        assert_eq!(cfg.web.bind, "0.0.0.0:8080");
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let bad = MINIMAL.replacen("schema_version = 1", "schema_version = 2", 1);
        assert!(matches!(load_config_from_str(&bad), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn requires_fabric_secret_or_secret_file() {
        let bad = MINIMAL.replacen(r#"secret = "hunter2""#, "", 1);
        assert!(matches!(load_config_from_str(&bad), Err(ConfigError::MissingField(_))));
    }
}
