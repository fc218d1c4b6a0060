//! Application configuration

pub mod tips;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use tips::TipBook;

pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_REMOTE_MODEL: &str = "llama-3.1-sonar-small-128k-online";

/// Which response strategy new sessions use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Canned tips only
    Local,
    /// Completion API, with instructional text while no credential is set
    Remote,
    /// Completion API when a credential is set, canned tips otherwise
    Auto,
}

impl FromStr for ResponseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ResponseMode::Local),
            "remote" => Ok(ResponseMode::Remote),
            "auto" => Ok(ResponseMode::Auto),
            other => Err(ConfigError::InvalidVar {
                name: "BROBOT_MODE".into(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mode: ResponseMode,
    /// Simulated thinking time of the local strategy
    pub typing_delay_ms: u64,
    /// Delay before the welcome message of a new session
    pub welcome_delay_ms: u64,
    pub remote_endpoint: String,
    pub remote_model: String,
    /// Unset means the transport default (no timeout)
    pub remote_timeout_secs: Option<u64>,
    pub tips_file: Option<PathBuf>,
    /// Sessions without client activity for this long are dropped; 0 keeps them
    pub session_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            mode: ResponseMode::Remote,
            typing_delay_ms: 1000,
            welcome_delay_ms: 1000,
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.into(),
            remote_model: DEFAULT_REMOTE_MODEL.into(),
            remote_timeout_secs: None,
            tips_file: None,
            session_idle_secs: 1800,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            mode: parse_var(&lookup, "BROBOT_MODE")?.unwrap_or(defaults.mode),
            typing_delay_ms: parse_var(&lookup, "BROBOT_TYPING_DELAY_MS")?
                .unwrap_or(defaults.typing_delay_ms),
            welcome_delay_ms: parse_var(&lookup, "BROBOT_WELCOME_DELAY_MS")?
                .unwrap_or(defaults.welcome_delay_ms),
            remote_endpoint: lookup("BROBOT_REMOTE_ENDPOINT").unwrap_or(defaults.remote_endpoint),
            remote_model: lookup("BROBOT_REMOTE_MODEL").unwrap_or(defaults.remote_model),
            remote_timeout_secs: parse_var(&lookup, "BROBOT_REMOTE_TIMEOUT_SECS")?,
            tips_file: lookup("BROBOT_TIPS_FILE").map(PathBuf::from),
            session_idle_secs: parse_var(&lookup, "BROBOT_SESSION_IDLE_SECS")?
                .unwrap_or(defaults.session_idle_secs),
        })
    }

    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }

    /// `None` when idle sessions are kept forever
    pub fn session_idle(&self) -> Option<Duration> {
        (self.session_idle_secs > 0).then(|| Duration::from_secs(self.session_idle_secs))
    }

    /// The configured tip book, or the builtin one
    pub fn load_tips(&self) -> Result<TipBook, ConfigError> {
        match &self.tips_file {
            Some(path) => TipBook::from_file(path),
            None => Ok(TipBook::default()),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar {
                name: name.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidVar { name: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.mode, ResponseMode::Remote);
        assert_eq!(config.typing_delay(), Duration::from_secs(1));
        assert_eq!(config.remote_endpoint, DEFAULT_REMOTE_ENDPOINT);
        assert!(config.remote_timeout_secs.is_none());
        assert_eq!(config.session_idle(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("BROBOT_MODE", "Auto"),
            ("BROBOT_TYPING_DELAY_MS", "0"),
            ("BROBOT_REMOTE_TIMEOUT_SECS", "30"),
            ("BROBOT_TIPS_FILE", "tips.toml"),
            ("BROBOT_SESSION_IDLE_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.mode, ResponseMode::Auto);
        assert_eq!(config.typing_delay(), Duration::ZERO);
        assert_eq!(config.remote_timeout_secs, Some(30));
        assert_eq!(config.tips_file, Some(PathBuf::from("tips.toml")));
        assert_eq!(config.session_idle(), None);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { ref name, .. } if name == "PORT"));

        assert!(Config::from_lookup(lookup_from(&[("BROBOT_MODE", "psychic")])).is_err());
    }

    #[test]
    fn test_builtin_tips_without_file() {
        let config = Config::default();
        assert_eq!(config.load_tips().unwrap(), TipBook::default());
    }
}
