//! Runtime configuration.
//!
//! Defaults are compiled in; the server reads overrides from the environment
//! (a `.env` file is loaded first by the binary).

use std::env;
use std::str::FromStr;

use crate::error::{ServerError, ServerResult};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum upload size (in bytes).
///
/// 50 MB limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Cohorts pre-selected for the trend view when the caller names none.
pub const DEFAULT_TREND_COHORTS: usize = 5;

pub const ENV_PORT: &str = "RETENTION_PORT";
pub const ENV_MAX_UPLOAD_BYTES: &str = "RETENTION_MAX_UPLOAD_BYTES";
pub const ENV_DEFAULT_TREND_COHORTS: &str = "RETENTION_DEFAULT_TREND_COHORTS";

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub default_trend_cohorts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_trend_cohorts: DEFAULT_TREND_COHORTS,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `RETENTION_*` environment variables.
    ///
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            port: parse_var(&lookup, ENV_PORT, defaults.port)?,
            max_upload_bytes: parse_var(&lookup, ENV_MAX_UPLOAD_BYTES, defaults.max_upload_bytes)?,
            default_trend_cohorts: parse_var(
                &lookup,
                ENV_DEFAULT_TREND_COHORTS,
                defaults.default_trend_cohorts,
            )?,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> ServerResult<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServerError::Config(format!("{}={} is not valid", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.default_trend_cohorts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_PORT, "8080"),
            (ENV_DEFAULT_TREND_COHORTS, " 3 "),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_trend_cohorts, 3);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_invalid_env_value() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_PORT, "http")])).unwrap_err();
        assert!(err.to_string().contains("RETENTION_PORT=http"));
    }
}
