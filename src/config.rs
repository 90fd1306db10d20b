//! Process configuration, read once from the environment at startup.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::pathways::TransformerSecret;
use crate::privacy::MasterSecret;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATA_CORE: &str = "flow-analytics";
pub const DEFAULT_TRANSFORMER_SECRET: &str = "_";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// A configuration variable is missing or unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Connection settings for the external event log.
#[derive(Clone)]
pub struct FlowcoreConfig {
    pub tenant: String,
    pub data_core: String,
    pub webhook_base_url: Url,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for FlowcoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowcoreConfig")
            .field("tenant", &self.tenant)
            .field("data_core", &self.data_core)
            .field("webhook_base_url", &self.webhook_base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub secret_key: MasterSecret,
    pub transformer_secret: TransformerSecret,
    pub flowcore: FlowcoreConfig,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Variables set to the empty string are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let secret_key =
            MasterSecret::new(require("SECRET_KEY")?).map_err(|e| ConfigError::Invalid {
                var: "SECRET_KEY",
                reason: e.to_string(),
            })?;

        let tenant = require("FLOWCORE_TENANT")?;
        let data_core = get("FLOWCORE_DATACORE").unwrap_or_else(|| DEFAULT_DATA_CORE.to_string());

        let base_url_raw = require("FLOWCORE_WEBHOOK_BASEURL")?;
        let webhook_base_url = Url::parse(&base_url_raw).map_err(|e| ConfigError::Invalid {
            var: "FLOWCORE_WEBHOOK_BASEURL",
            reason: e.to_string(),
        })?;
        if webhook_base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                var: "FLOWCORE_WEBHOOK_BASEURL",
                reason: "not a base URL".to_string(),
            });
        }

        let api_key = require("FLOWCORE_API_KEY")?;

        let transformer_secret = TransformerSecret::new(
            get("FLOWCORE_TRANSFORMER_SECRET")
                .unwrap_or_else(|| DEFAULT_TRANSFORMER_SECRET.to_string()),
        );

        let timeout_secs = match get("FLOWCORE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "FLOWCORE_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
                    return Err(ConfigError::Invalid {
                        var: "FLOWCORE_TIMEOUT_SECS",
                        reason: format!("must be between 1 and {}", MAX_TIMEOUT_SECS),
                    });
                }
                secs
            }
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            port,
            secret_key,
            transformer_secret,
            flowcore: FlowcoreConfig {
                tenant,
                data_core,
                webhook_base_url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}
