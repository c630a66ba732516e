use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::constants::DEFAULT_WEB_BASE;
use crate::extractor::ProxyConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Credentials
    pub default_cookies: Option<String>,

    // Web Server
    pub listen_host: String,
    pub listen_port: u16,

    // Outbound proxy
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,

    // Extraction
    pub request_timeout: Duration,
    pub batch_concurrency: usize,
    pub max_batch_size: usize,
    pub web_base: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Credentials
            default_cookies: optional_env("XHS_COOKIES"),

            // Web Server
            listen_host: env_or_default("API_HOST", "0.0.0.0"),
            listen_port: parse_env_u16("API_PORT", 8000)?,

            // Outbound proxy
            proxy_host: optional_env("PROXY_HOST"),
            proxy_port: parse_optional_env_u16("PROXY_PORT")?,

            // Extraction
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 10)?),
            batch_concurrency: parse_env_usize("BATCH_CONCURRENCY", 4)?,
            max_batch_size: parse_env_usize("MAX_BATCH_SIZE", 100)?,
            web_base: env_or_default("XHS_WEB_BASE", DEFAULT_WEB_BASE)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Configuration with every field populated, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            default_cookies: Some("a1=test; web_session=test".to_string()),
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            proxy_host: None,
            proxy_port: None,
            request_timeout: Duration::from_secs(2),
            batch_concurrency: 4,
            max_batch_size: 100,
            web_base: DEFAULT_WEB_BASE.to_string(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BATCH_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_BATCH_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Err(e) = Url::parse(&self.web_base) {
            return Err(ConfigError::InvalidValue {
                name: "XHS_WEB_BASE".to_string(),
                message: e.to_string(),
            });
        }
        Ok(())
    }

    /// The outbound proxy, when both host and port are configured.
    #[must_use]
    pub fn proxy(&self) -> Option<ProxyConfig> {
        ProxyConfig::from_parts(self.proxy_host.as_deref(), self.proxy_port)
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_env(name) {
        Some(val) => val.trim().parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    Ok(parse_optional_env_u16(name)?.unwrap_or(default))
}

fn parse_optional_env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
    optional_env(name)
        .map(|val| {
            val.trim().parse().map_err(|e| ConfigError::ParseInt {
                name: name.to_string(),
                source: e,
            })
        })
        .transpose()
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match optional_env(name) {
        Some(val) => val.trim().parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}
