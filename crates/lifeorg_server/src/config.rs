//! Server configuration from environment variables.
//!
//! # Responsibility
//! - Read `LIFEORG_*` variables (after `.env` loading in `main`) with
//!   logged defaults.
//!
//! # Invariants
//! - A present but unparsable value is an error, never silently replaced.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use log::info;
use thiserror::Error;

pub const BIND_VAR: &str = "LIFEORG_BIND";
pub const DB_PATH_VAR: &str = "LIFEORG_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "LIFEORG_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "LIFEORG_LOG_DIR";
pub const TOKEN_TTL_VAR: &str = "LIFEORG_TOKEN_TTL_DAYS";

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_DB_PATH: &str = "lifeorg.sqlite3";
const DEFAULT_TOKEN_TTL_DAYS: &str = "30";

#[derive(Debug, Error)]
#[error("Invalid {key} value {value:?}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub log_level: String,
    /// Rolling log files are written here when set; stderr only otherwise.
    pub log_dir: Option<String>,
    pub token_ttl_days: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token_ttl_days: u32 = try_load(&lookup, TOKEN_TTL_VAR, DEFAULT_TOKEN_TTL_DAYS)?;
        if token_ttl_days == 0 {
            return Err(ConfigError {
                key: TOKEN_TTL_VAR,
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            bind: try_load(&lookup, BIND_VAR, DEFAULT_BIND)?,
            db_path: PathBuf::from(load_or(&lookup, DB_PATH_VAR, DEFAULT_DB_PATH)),
            log_level: load_or(&lookup, LOG_LEVEL_VAR, lifeorg_core::default_log_level()),
            log_dir: var(&lookup, LOG_DIR_VAR),
            token_ttl_days,
        })
    }
}

fn var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn load_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    var(lookup, key).unwrap_or_else(|| {
        info!("event=config_default module=config key={key} value={default}");
        default.to_string()
    })
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = load_or(lookup, key, default);
    value.parse().map_err(|err: T::Err| ConfigError {
        key,
        message: err.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, BIND_VAR, LOG_DIR_VAR, TOKEN_TTL_VAR};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind.to_string(), "127.0.0.1:8000");
        assert_eq!(config.token_ttl_days, 30);
        assert_eq!(config.log_dir, None);
        assert!(config.db_path.ends_with("lifeorg.sqlite3"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            (BIND_VAR, "0.0.0.0:9000"),
            (TOKEN_TTL_VAR, " 7 "),
            (LOG_DIR_VAR, "/var/log/lifeorg"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.token_ttl_days, 7);
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/lifeorg"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[(BIND_VAR, "not-an-address")])).unwrap_err();
        assert_eq!(err.key, BIND_VAR);
        assert!(Config::from_lookup(lookup(&[(TOKEN_TTL_VAR, "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[(TOKEN_TTL_VAR, "-3")])).is_err());
    }
}
