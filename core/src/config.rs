//! Client configuration.
//!
//! Defaults target a locally running backend; `from_env` and
//! `load_from_file` override them for real deployments.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const ENV_BASE_URL: &str = "DYNRES_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "DYNRES_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "DYNRES_CONNECT_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "DYNRES_USER_AGENT";

/// Settings shared by the clients and the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// API root every route is expanded under, e.g.
    /// `https://api.example.com/v1/my-app`.
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            user_agent: concat!("dynres/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by any `DYNRES_*` variables that are set.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout_secs = parse_secs(ENV_CONNECT_TIMEOUT_SECS, &value)?;
        }
        if let Some(user_agent) = lookup(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "base URL must be http(s): `{}`",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ApiError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::Config(format!("{key} must be a whole number of seconds, got `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("dynres/"));
    }

    #[test]
    fn env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://api.example.com/v1/app"),
            (ENV_TIMEOUT_SECS, "12"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v1/app");
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn bad_timeout_is_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn non_http_base_url_rejected() {
        let err = ClientConfig::new("ftp://example.com").validate().unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"baseUrl":"https://api.example.com"}"#).unwrap();
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ClientConfig::load_from_file("/nonexistent/dynres.json").unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
