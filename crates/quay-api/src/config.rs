//! Server configuration from `QUAY_*` environment variables.

use std::path::PathBuf;

use quay_core::ErrorKind;
use thiserror::Error;

use crate::route::normalize_endpoint;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidParameter
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Endpoint for routes that do not name their own.
    pub base_endpoint: String,
    pub body_limit_bytes: usize,
    /// Route manifest to load at startup.
    pub routes: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            base_endpoint: "/".to_string(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            routes: None,
        }
    }
}

impl ServerConfig {
    /// Read `QUAY_PORT`, `QUAY_BASE_ENDPOINT`, `QUAY_BODY_LIMIT_BYTES` and
    /// `QUAY_ROUTES`. Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("QUAY_PORT") {
            config.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "QUAY_PORT",
                value: port.clone(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(endpoint) = get("QUAY_BASE_ENDPOINT") {
            config.base_endpoint = normalize_endpoint(&endpoint);
        }
        if let Some(limit) = get("QUAY_BODY_LIMIT_BYTES") {
            config.body_limit_bytes = limit.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "QUAY_BODY_LIMIT_BYTES",
                value: limit.clone(),
                reason: format!("{e}"),
            })?;
        }
        config.routes = get("QUAY_ROUTES").map(PathBuf::from);

        Ok(config)
    }
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
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.body_limit_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("QUAY_PORT", "9000"),
            ("QUAY_BASE_ENDPOINT", "api/v1/"),
            ("QUAY_BODY_LIMIT_BYTES", "1024"),
            ("QUAY_ROUTES", "routes.yaml"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.base_endpoint, "/api/v1");
        assert_eq!(config.body_limit_bytes, 1024);
        assert_eq!(config.routes, Some(PathBuf::from("routes.yaml")));
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("QUAY_PORT", "  ")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn bad_port_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("QUAY_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "QUAY_PORT", .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
