//! Client configuration
//!
//! Loaded from a TOML file or from the flat property map older clients pass
//! around (`pingInterval`, `dispatch/connection/delay`, ...). Secrets are
//! never stored in the file: the password is read from the environment
//! variable named by `password_env`.

use crate::codec::{CallbackAddress, ConnectOptions};
use crate::connection::ConnectionSettings;
use crate::observability::logging::{parse_level, LogFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

/// Complete client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub session: SessionSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Extra connect options written onto the `<callback>` element
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Login and callback
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    pub login_name: String,
    /// Environment variable containing the password
    pub password_env: Option<String>,
    /// Plain password, only set from a property map
    #[serde(skip)]
    pub password: Option<String>,
    /// URL the server delivers updates to; no callback if absent
    pub callback_address: Option<String>,
    #[serde(default = "default_callback_type")]
    pub callback_type: String,
    pub callback_session_id: Option<String>,
}

impl std::fmt::Debug for SessionSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSection")
            .field("login_name", &self.login_name)
            .field("password_env", &self.password_env)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("callback_address", &self.callback_address)
            .field("callback_type", &self.callback_type)
            .field(
                "callback_session_id",
                &self.callback_session_id.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

fn default_callback_type() -> String {
    crate::codec::connect::DEFAULT_CALLBACK_TYPE.to_string()
}

/// Heartbeat and reconnect timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchSection {
    /// Heartbeat interval; 0 or less disables the pinger
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: i64,
    /// Delay between reconnect attempts
    #[serde(default = "default_delay_ms")]
    pub delay_ms: i64,
    /// Reconnect attempts; -1 retries forever
    #[serde(default = "default_retries")]
    pub retries: i64,
    /// Overrides `retries` when set
    pub max_retries: Option<u32>,
    /// Bound on each server call; 0 waits forever
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_ping_interval_ms() -> i64 {
    5000
}

fn default_delay_ms() -> i64 {
    5000
}

fn default_retries() -> i64 {
    -1
}

fn default_response_timeout_ms() -> u64 {
    60_000
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            delay_ms: default_delay_ms(),
            retries: default_retries(),
            max_retries: None,
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl DispatchSection {
    /// Reconnect bound; `None` means forever
    pub fn effective_max_retries(&self) -> Option<u32> {
        self.max_retries
            .or_else(|| u32::try_from(self.retries).ok())
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub spans: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            spans: false,
        }
    }
}

impl LoggingSection {
    pub fn level(&self) -> Level {
        parse_level(&self.level)
    }

    pub fn format(&self) -> LogFormat {
        LogFormat::parse(&self.format)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Minimal configuration for `login_name`
    pub fn new<S: Into<String>>(login_name: S) -> Self {
        Self {
            session: SessionSection {
                login_name: login_name.into(),
                password_env: None,
                password: None,
                callback_address: None,
                callback_type: default_callback_type(),
                callback_session_id: None,
            },
            dispatch: DispatchSection::default(),
            logging: LoggingSection::default(),
            options: BTreeMap::new(),
        }
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from a flat property map; unknown keys become connect options
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let login_name = properties
            .get("loginName")
            .or_else(|| properties.get("session.name"))
            .cloned()
            .ok_or_else(|| ConfigError::InvalidConfig("loginName is required".to_string()))?;
        let mut config = Self::new(login_name);

        for (key, value) in properties {
            match key.as_str() {
                "loginName" | "session.name" => {}
                "passwd" => config.session.password = Some(value.clone()),
                "passwordEnv" => config.session.password_env = Some(value.clone()),
                "callbackAddress" => config.session.callback_address = Some(value.clone()),
                "callbackType" => config.session.callback_type = value.clone(),
                "callbackSessionId" => config.session.callback_session_id = Some(value.clone()),
                "pingInterval" | "dispatch/connection/pingInterval" => {
                    config.dispatch.ping_interval_ms = parse_number(key, value)?;
                }
                "delay" | "dispatch/connection/delay" => {
                    config.dispatch.delay_ms = parse_number(key, value)?;
                }
                "retries" | "dispatch/connection/retries" => {
                    config.dispatch.retries = parse_number(key, value)?;
                }
                "maxRetries" => config.dispatch.max_retries = Some(parse_number(key, value)?),
                "responseTimeout" => {
                    config.dispatch.response_timeout_ms = parse_number(key, value)?;
                }
                "logLevel" => config.logging.level = value.clone(),
                "logFormat" => config.logging.format = value.clone(),
                _ => {
                    config.options.insert(key.clone(), value.clone());
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be fixed up silently
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.login_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "session.login_name must not be empty".to_string(),
            ));
        }
        if let Some(address) = &self.session.callback_address {
            url::Url::parse(address).map_err(|e| {
                ConfigError::InvalidConfig(format!("callback_address '{address}' is not a URL: {e}"))
            })?;
        }
        if self.session.callback_type.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "session.callback_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the password: explicit value first, then `password_env`
    pub fn password(&self) -> Result<String, ConfigError> {
        if let Some(password) = &self.session.password {
            return Ok(password.clone());
        }
        match &self.session.password_env {
            Some(name) => {
                std::env::var(name).map_err(|_| ConfigError::EnvVarNotFound(name.clone()))
            }
            None => Ok(String::new()),
        }
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::from_map(&self.options)
            .with_ping_interval(self.dispatch.ping_interval_ms)
            .with_retries(self.dispatch.retries)
            .with_delay(self.dispatch.delay_ms)
    }

    pub fn callback_address(&self) -> Option<CallbackAddress> {
        self.session.callback_address.as_ref().map(|address| {
            let mut callback = CallbackAddress::new(address.clone());
            callback.protocol = self.session.callback_type.clone();
            callback.session_id = self.session.callback_session_id.clone();
            callback
        })
    }

    /// Everything the connection manager needs, with secrets resolved
    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        let mut settings = ConnectionSettings::new(&self.session.login_name, self.password()?)
            .with_connect_options(self.connect_options())
            .with_retry_delay(self.dispatch.delay_ms)
            .with_max_retries(self.dispatch.effective_max_retries())
            .with_response_timeout(self.dispatch.response_timeout());
        if let Some(callback) = self.callback_address() {
            settings = settings.with_callback(callback);
        }
        Ok(settings)
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidConfig(format!("{key}='{value}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
[session]
login_name = "joe"
"#,
        )
        .expect("valid config");

        assert_eq!(config.dispatch, DispatchSection::default());
        assert_eq!(config.dispatch.effective_max_retries(), None);
        assert_eq!(
            config.dispatch.response_timeout(),
            Some(Duration::from_millis(60_000))
        );
        assert_eq!(config.session.callback_type, "XMLRPC");
        assert_eq!(config.logging.level(), Level::INFO);
        assert!(config.callback_address().is_none());
    }

    #[test]
    fn test_full_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
[session]
login_name = "joe"
callback_address = "http://localhost:8081/RPC2"
callback_type = "SOCKET"

[dispatch]
ping_interval_ms = 10000
delay_ms = 2000
max_retries = 7
response_timeout_ms = 0

[logging]
level = "DUMP"
format = "compact"

[options]
oneway = "true"
"#,
        )
        .expect("valid config");

        assert_eq!(config.dispatch.effective_max_retries(), Some(7));
        assert_eq!(config.dispatch.response_timeout(), None);
        assert_eq!(config.logging.level(), Level::TRACE);
        assert_eq!(config.logging.format(), LogFormat::Compact);

        let callback = config.callback_address().expect("callback configured");
        assert_eq!(callback.protocol, "SOCKET");

        let options = config.connect_options();
        assert_eq!(options.ping_interval(), 10_000);
        assert_eq!(options.extra().get("oneway").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_invalid_callback_url_rejected() {
        let err = ClientConfig::from_toml_str(
            r#"
[session]
login_name = "joe"
callback_address = "not a url"
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_login_rejected() {
        let err = ClientConfig::from_toml_str("[session]\nlogin_name = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_session_is_parse_error() {
        let err = ClientConfig::from_toml_str("[dispatch]\ndelay_ms = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_from_properties_short_and_long_keys() {
        let properties: HashMap<String, String> = [
            ("loginName", "joe"),
            ("passwd", "secret"),
            ("dispatch/connection/pingInterval", "20000"),
            ("delay", "8000"),
            ("retries", "3"),
            ("logLevel", "WARN"),
            ("compress/type", "zlib"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ClientConfig::from_properties(&properties).expect("valid properties");

        assert_eq!(config.dispatch.ping_interval_ms, 20_000);
        assert_eq!(config.dispatch.delay_ms, 8000);
        assert_eq!(config.dispatch.effective_max_retries(), Some(3));
        assert_eq!(config.password().expect("password"), "secret");
        assert_eq!(config.logging.level(), Level::WARN);
        assert_eq!(
            config.options.get("compress/type").map(String::as_str),
            Some("zlib")
        );
    }

    #[test]
    fn test_from_properties_rejects_bad_numbers() {
        let properties: HashMap<String, String> = [("loginName", "joe"), ("pingInterval", "soon")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let err = ClientConfig::from_properties(&properties).unwrap_err();
        assert!(err.to_string().contains("pingInterval"));
    }

    #[test]
    fn test_password_env_resolution() {
        let mut config = ClientConfig::new("joe");
        config.session.password_env = Some("XBCLIENT_TEST_PASSWORD_UNSET_9F3A".to_string());
        assert!(matches!(
            config.password(),
            Err(ConfigError::EnvVarNotFound(_))
        ));

        std::env::set_var("XBCLIENT_TEST_PASSWORD_SET_9F3A", "from-env");
        config.session.password_env = Some("XBCLIENT_TEST_PASSWORD_SET_9F3A".to_string());
        assert_eq!(config.password().expect("resolved"), "from-env");
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = ClientConfig::new("joe");
        config.session.password = Some("hunter2".to_string());
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
