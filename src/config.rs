//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Which persistence backend to construct at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// libSQL database file at `path`.
    LibSql { path: String },
    /// Process-local maps, lost on restart.
    Memory,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Interface to bind the HTTP server to.
    pub host: String,
    /// HTTP port.
    pub port: u16,
    /// Persistence backend.
    pub storage: StorageBackend,
    /// Root URL of the language service providing banned words.
    pub language_service: String,
    /// Upper bound on the banned word fetch.
    pub oracle_timeout: Duration,
    /// Upper bound on each link content-type probe.
    pub probe_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageBackend::LibSql {
                path: "./data/filter.db".to_string(),
            },
            language_service: "http://localhost:8081".to_string(),
            oracle_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl ServiceConfig {
    /// Build configuration from `FILTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults; set but unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("FILTER_HOST").unwrap_or(defaults.host);
        let port = parse_or(&lookup, "FILTER_PORT", defaults.port)?;

        let storage = match lookup("FILTER_STORAGE").as_deref().map(str::trim) {
            None | Some("libsql") => StorageBackend::LibSql {
                path: lookup("FILTER_DB_PATH").unwrap_or_else(|| "./data/filter.db".to_string()),
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "FILTER_STORAGE".into(),
                    message: format!("unknown backend '{other}' (expected libsql or memory)"),
                });
            }
        };

        let language_service =
            lookup("FILTER_LANGUAGE_SERVICE").unwrap_or(defaults.language_service);

        let oracle_timeout = Duration::from_secs(parse_or(
            &lookup,
            "FILTER_ORACLE_TIMEOUT_SECS",
            defaults.oracle_timeout.as_secs(),
        )?);
        let probe_timeout = Duration::from_secs(parse_or(
            &lookup,
            "FILTER_PROBE_TIMEOUT_SECS",
            defaults.probe_timeout.as_secs(),
        )?);

        Ok(Self {
            host,
            port,
            storage,
            language_service,
            oracle_timeout,
            probe_timeout,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
    }
}
