//! Configuration management

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use pwmail_auth::FreshnessGate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub database_path: PathBuf,
    pub freshness_window_secs: u64,
    pub max_future_skew_secs: u64,
    pub max_page_size: u64,
    /// 0 disables nonce compaction
    pub compaction_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_path: PathBuf::from("pwmail.db"),
            freshness_window_secs: 180,
            max_future_skew_secs: 30,
            max_page_size: 100,
            compaction_interval_secs: 600,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file and environment variables
    ///
    /// Precedence: defaults, then `PWMAIL_CONFIG` file, then `PWMAIL_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("PWMAIL_CONFIG") {
            Ok(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            Err(_) => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `PWMAIL_*` overrides read through `var`
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(addr) = var("PWMAIL_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid listen_addr: {}", e)))?;
        }

        if let Some(path) = var("PWMAIL_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }

        let number = |key: &str, raw: String| {
            raw.parse::<u64>()
                .map_err(|e| ConfigError::Invalid(format!("Invalid {}: {}", key, e)))
        };

        if let Some(raw) = var("PWMAIL_FRESHNESS_WINDOW_SECS") {
            self.freshness_window_secs = number("PWMAIL_FRESHNESS_WINDOW_SECS", raw)?;
        }

        if let Some(raw) = var("PWMAIL_MAX_FUTURE_SKEW_SECS") {
            self.max_future_skew_secs = number("PWMAIL_MAX_FUTURE_SKEW_SECS", raw)?;
        }

        if let Some(raw) = var("PWMAIL_MAX_PAGE_SIZE") {
            self.max_page_size = number("PWMAIL_MAX_PAGE_SIZE", raw)?;
        }

        if let Some(raw) = var("PWMAIL_COMPACTION_INTERVAL_SECS") {
            self.compaction_interval_secs = number("PWMAIL_COMPACTION_INTERVAL_SECS", raw)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freshness_window_secs == 0 {
            return Err(ConfigError::Invalid("freshness_window_secs must be > 0".to_string()));
        }

        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid("max_page_size must be > 0".to_string()));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn freshness_gate(&self) -> FreshnessGate {
        FreshnessGate::new(
            Duration::from_secs(self.freshness_window_secs),
            Duration::from_secs(self.max_future_skew_secs),
        )
    }

    /// None when compaction is disabled
    pub fn compaction_interval(&self) -> Option<Duration> {
        match self.compaction_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
