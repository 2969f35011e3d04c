use std::path::Path;
use std::time::Duration;

use hyper::header::{HeaderName, HeaderValue};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Middleware configuration, keyed the same way as the Traefik plugin
/// configuration it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretHeaderConfig {
    pub secret_name: String,
    pub secret_key: String,
    pub header_name: String,
    pub namespace: String,
    /// Seconds a fetched value is trusted. Zero disables caching.
    #[serde(rename = "cacheTTL")]
    pub cache_ttl: u64,
    pub value_prefix: String,
}

impl Default for SecretHeaderConfig {
    fn default() -> Self {
        SecretHeaderConfig {
            secret_name: String::new(),
            secret_key: String::new(),
            header_name: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL_SECS,
            value_prefix: String::new(),
        }
    }
}

impl SecretHeaderConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks required fields and fills defaults. Must succeed before the
    /// middleware is built.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.secret_name.is_empty() {
            return Err(ConfigError::MissingField("secretName"));
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::MissingField("secretKey"));
        }
        if self.header_name.is_empty() {
            return Err(ConfigError::MissingField("headerName"));
        }
        self.parsed_header_name()?;
        HeaderValue::from_str(&self.value_prefix).map_err(ConfigError::InvalidValuePrefix)?;

        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        Ok(self)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub(crate) fn parsed_header_name(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|source| {
            ConfigError::InvalidHeaderName {
                name: self.header_name.clone(),
                source,
            }
        })
    }
}
