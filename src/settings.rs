//! Service configuration from environment variables.
//!
//! All variables are prefixed `DBPULSE_`. Parsing goes through a lookup
//! closure so tests can feed a map instead of mutating the process
//! environment. Every parse failure carries the variable name in
//! [`ConfigError::InvalidEnvVar`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dbpulse_core::config::{ConnectionConfig, PoolBounds, PoolSize, SecuritySettings};
use dbpulse_core::error::ConfigError;
use dbpulse_pool::PoolSettings;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Runtime knobs unrelated to the database connection itself.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Address the health surface listens on.
    pub bind: SocketAddr,
    /// Log output format.
    pub log_format: LogFormat,
    /// Override for the driver library search roots; `None` uses the
    /// packaging defaults.
    pub driver_search_roots: Option<Vec<PathBuf>>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            log_format: LogFormat::default(),
            driver_search_roots: None,
        }
    }
}

/// Full service settings: the validated connection config, pool tuning,
/// and runtime knobs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub pool: PoolSettings,
    pub runtime: RuntimeSettings,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ConnectionConfig::builder();

        if let Some(driver) = lookup("DBPULSE_DRIVER") {
            builder = builder.driver(driver);
        }
        if let Some(server) = lookup("DBPULSE_SERVER") {
            builder = builder.server(server);
        }
        if let Some(port) = lookup("DBPULSE_PORT") {
            builder = builder.port(parse_var("DBPULSE_PORT", &port)?);
        }
        if let Some(database) = lookup("DBPULSE_DATABASE") {
            builder = builder.database(database);
        }
        if let Some(username) = lookup("DBPULSE_USERNAME") {
            builder = builder.username(username);
        }
        if let Some(password) = lookup("DBPULSE_PASSWORD") {
            builder = builder.password(password);
        }
        if let Some(trusted) = lookup("DBPULSE_TRUSTED_CONNECTION") {
            builder = builder.trusted_connection(parse_bool("DBPULSE_TRUSTED_CONNECTION", &trusted)?);
        }

        let mut security = SecuritySettings::default();
        if let Some(encrypt) = lookup("DBPULSE_ENCRYPT") {
            security.encrypt = parse_bool("DBPULSE_ENCRYPT", &encrypt)?;
        }
        if let Some(trust) = lookup("DBPULSE_TRUST_SERVER_CERTIFICATE") {
            security.trust_server_certificate =
                parse_bool("DBPULSE_TRUST_SERVER_CERTIFICATE", &trust)?;
        }
        if let Some(path) = lookup("DBPULSE_CERTIFICATE") {
            security.certificate_path = Some(PathBuf::from(path));
        }
        if let Some(timeout) = lookup("DBPULSE_CONNECT_TIMEOUT") {
            security.connect_timeout = parse_duration("DBPULSE_CONNECT_TIMEOUT", &timeout)?;
        }
        if let Some(timeout) = lookup("DBPULSE_COMMAND_TIMEOUT") {
            security.command_timeout = parse_duration("DBPULSE_COMMAND_TIMEOUT", &timeout)?;
        }
        builder = builder.security(security);

        let min = match lookup("DBPULSE_POOL_MIN") {
            Some(raw) => parse_var("DBPULSE_POOL_MIN", &raw)?,
            None => PoolBounds::default().min,
        };
        let max = match lookup("DBPULSE_POOL_MAX") {
            Some(raw) => {
                let size: u8 = parse_var("DBPULSE_POOL_MAX", &raw)?;
                PoolSize::new(size).ok_or_else(|| ConfigError::InvalidEnvVar {
                    key: "DBPULSE_POOL_MAX".to_string(),
                    message: format!(
                        "{} is out of range ({}-{})",
                        size,
                        PoolSize::MIN,
                        PoolSize::MAX
                    ),
                })?
            }
            None => PoolSize::default_size(),
        };
        builder = builder.pool(PoolBounds::new(min, max)?);

        if let Some(timeout) = lookup("DBPULSE_ACQUIRE_TIMEOUT") {
            builder = builder.acquire_timeout(parse_duration("DBPULSE_ACQUIRE_TIMEOUT", &timeout)?);
        }

        let connection = builder.build()?;

        let mut pool = PoolSettings::from_config(&connection);
        if let Some(attempts) = lookup("DBPULSE_CONNECT_ATTEMPTS") {
            pool = pool.with_connect_attempts(parse_var("DBPULSE_CONNECT_ATTEMPTS", &attempts)?);
        }
        if let Some(base) = lookup("DBPULSE_BACKOFF_BASE") {
            pool = pool.with_backoff_base(parse_duration("DBPULSE_BACKOFF_BASE", &base)?);
        }
        if let Some(timeout) = lookup("DBPULSE_PROBE_TIMEOUT") {
            pool = pool.with_probe_timeout(parse_duration("DBPULSE_PROBE_TIMEOUT", &timeout)?);
        }
        if let Some(threshold) = lookup("DBPULSE_DEGRADED_THRESHOLD") {
            pool = pool
                .with_degraded_threshold(parse_duration("DBPULSE_DEGRADED_THRESHOLD", &threshold)?);
        }
        if let Some(timeout) = lookup("DBPULSE_DRAIN_TIMEOUT") {
            pool = pool.with_drain_timeout(parse_duration("DBPULSE_DRAIN_TIMEOUT", &timeout)?);
        }

        let mut runtime = RuntimeSettings::default();
        if let Some(bind) = lookup("DBPULSE_BIND") {
            runtime.bind = parse_var("DBPULSE_BIND", &bind)?;
        }
        if let Some(format) = lookup("DBPULSE_LOG_FORMAT") {
            runtime.log_format = match format.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::InvalidEnvVar {
                        key: "DBPULSE_LOG_FORMAT".to_string(),
                        message: format!("unknown format '{}', expected 'pretty' or 'json'", other),
                    });
                }
            };
        }
        if let Some(roots) = lookup("DBPULSE_DRIVER_SEARCH_ROOTS") {
            runtime.driver_search_roots = Some(
                roots
                    .split(':')
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect(),
            );
        }

        Ok(Self {
            connection,
            pool,
            runtime,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err| ConfigError::InvalidEnvVar {
        key: key.to_string(),
        message: format!("'{}': {}", raw, err),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar {
            key: key.to_string(),
            message: format!("'{}' is not a boolean (use true/false)", raw),
        }),
    }
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|err| ConfigError::InvalidEnvVar {
        key: key.to_string(),
        message: format!("'{}': {}", raw, err),
    })
}
