//! Validated connection configuration.
//!
//! Configuration is loaded once per process lifetime and treated as
//! immutable afterwards. Invariants are enforced at construction:
//!
//! - Credentials and trusted-connection mode are mutually exclusive.
//! - Pool bounds are within range and `min <= max`.
//! - Names and hosts are validated before they reach a connection string.
//!
//! # Example
//!
//! ```rust
//! use dbpulse_core::config::ConnectionConfig;
//!
//! let config = ConnectionConfig::builder()
//!     .server("db.internal")
//!     .database("orders")
//!     .credentials("svc_orders", "hunter2")
//!     .build()
//!     .expect("valid config");
//!
//! assert!(config.connection_string().contains("DATABASE=orders"));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Connection pool size constrained to the valid range (1-100).
///
/// The minimum of 1 guarantees at least one connection can exist; the
/// maximum of 100 prevents resource exhaustion on the database side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct PoolSize(u8);

impl PoolSize {
    /// Minimum allowed pool size.
    pub const MIN: u8 = 1;
    /// Maximum allowed pool size.
    pub const MAX: u8 = 100;

    /// Create a pool size, returning `None` outside 1-100.
    pub const fn new(size: u8) -> Option<Self> {
        if size < Self::MIN || size > Self::MAX {
            None
        } else {
            Some(Self(size))
        }
    }

    /// Create a pool size from usize (for env-sourced values).
    pub fn from_usize(size: usize) -> Option<Self> {
        if size < Self::MIN as usize || size > Self::MAX as usize {
            None
        } else {
            Some(Self(size as u8))
        }
    }

    /// Get the pool size as a usize.
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// Default pool size for production use (5 connections).
    pub const fn default_size() -> Self {
        Self(5)
    }
}

impl Default for PoolSize {
    fn default() -> Self {
        Self::default_size()
    }
}

impl TryFrom<usize> for PoolSize {
    type Error = ConfigError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::from_usize(size).ok_or(ConfigError::InvalidField {
            field: "pool size",
            reason: format!("{} is out of range ({}-{})", size, Self::MIN, Self::MAX),
        })
    }
}

impl From<PoolSize> for usize {
    fn from(size: PoolSize) -> Self {
        size.get()
    }
}

impl std::fmt::Display for PoolSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database name validated for safe use in a connection string.
///
/// Non-empty, at most 128 characters, alphanumeric plus underscore and
/// hyphen, and not starting with a hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Maximum length for database names.
    pub const MAX_LENGTH: usize = 128;

    /// Create a database name with validation.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();

        if name.is_empty() || name.len() > Self::MAX_LENGTH {
            return None;
        }

        if name.starts_with('-') {
            return None;
        }

        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return None;
        }

        Some(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatabaseName {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name.clone()).ok_or(ConfigError::InvalidField {
            field: "database name",
            reason: format!("'{}' contains invalid characters or length", name),
        })
    }
}

impl From<DatabaseName> for String {
    fn from(name: DatabaseName) -> Self {
        name.0
    }
}

impl std::fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server host validated against traversal and length abuse.
///
/// Accepts hostnames, IPv4, and IPv6 literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostAddress(String);

impl HostAddress {
    /// Maximum length (DNS hostname limit).
    pub const MAX_LENGTH: usize = 253;

    /// Create a host address with validation.
    pub fn new(host: impl Into<String>) -> Option<Self> {
        let host = host.into();

        if host.is_empty() || host.len() > Self::MAX_LENGTH {
            return None;
        }

        if host.contains("..") {
            return None;
        }

        // Connection strings are semicolon-delimited; a host containing a
        // delimiter could smuggle extra parameters.
        if host.contains(';') || host.contains('=') {
            return None;
        }

        Some(Self(host))
    }

    /// Get the host as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Localhost host address.
    pub fn localhost() -> Self {
        Self("localhost".to_string())
    }
}

impl TryFrom<String> for HostAddress {
    type Error = ConfigError;

    fn try_from(host: String) -> Result<Self, Self::Error> {
        Self::new(host.clone()).ok_or(ConfigError::InvalidField {
            field: "server host",
            reason: format!("'{}' is not a valid host address", host),
        })
    }
}

impl From<HostAddress> for String {
    fn from(host: HostAddress) -> Self {
        host.0
    }
}

impl std::fmt::Display for HostAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum and maximum live connections for the pool.
///
/// `min` is the number of connections pre-established at startup (zero keeps
/// the pool fully lazy); `max` is the hard bound the supervisor never
/// exceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBounds {
    pub min: u8,
    pub max: PoolSize,
}

impl PoolBounds {
    /// Create bounds, rejecting `min > max`.
    pub fn new(min: u8, max: PoolSize) -> Result<Self, ConfigError> {
        if min as usize > max.get() {
            return Err(ConfigError::PoolBoundsInverted {
                min: min as usize,
                max: max.get(),
            });
        }
        Ok(Self { min, max })
    }
}

impl Default for PoolBounds {
    fn default() -> Self {
        Self {
            min: 0,
            max: PoolSize::default_size(),
        }
    }
}

/// How the process authenticates to the database.
///
/// The two modes are mutually exclusive by construction; there is no value
/// of this type carrying both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Username/password authentication.
    Credentials { username: String, password: String },
    /// OS-level trusted connection (no credentials on the wire).
    TrustedConnection,
}

/// Transport security and timeout parameters for the connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySettings {
    /// Encrypt traffic to the server.
    pub encrypt: bool,
    /// Accept the server certificate without CA validation.
    pub trust_server_certificate: bool,
    /// Path to a CA certificate bundle, when pinned.
    pub certificate_path: Option<PathBuf>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for individual commands on an established connection.
    pub command_timeout: Duration,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            encrypt: true,
            trust_server_certificate: false,
            certificate_path: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// Immutable database connection configuration.
///
/// Constructed once at startup through [`ConnectionConfigBuilder`] and
/// shared by reference for the process's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    driver: String,
    server: HostAddress,
    port: Option<u16>,
    database: DatabaseName,
    auth: AuthMode,
    security: SecuritySettings,
    pool: PoolBounds,
    acquire_timeout: Duration,
}

impl ConnectionConfig {
    /// Start building a configuration.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Driver display name (selects the native artifact to provision).
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Server host.
    pub fn server(&self) -> &HostAddress {
        &self.server
    }

    /// Server port, when not using the driver default.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Database name.
    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    /// Authentication mode.
    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    /// Transport security settings.
    pub fn security(&self) -> &SecuritySettings {
        &self.security
    }

    /// Pool bounds.
    pub fn pool(&self) -> PoolBounds {
        self.pool
    }

    /// How long `acquire` may wait for a pool slot.
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Render the full ODBC-style connection string, including credentials.
    ///
    /// Never log the result; use [`Self::redacted_connection_string`] for
    /// diagnostics.
    pub fn connection_string(&self) -> String {
        self.render_connection_string(false)
    }

    /// Render the connection string with the password masked.
    pub fn redacted_connection_string(&self) -> String {
        self.render_connection_string(true)
    }

    fn render_connection_string(&self, redact: bool) -> String {
        let server = match self.port {
            Some(port) => format!("{},{}", self.server, port),
            None => self.server.to_string(),
        };

        let mut parts = vec![
            format!("DRIVER={{{}}}", self.driver),
            format!("SERVER={}", server),
            format!("DATABASE={}", self.database),
        ];

        match &self.auth {
            AuthMode::TrustedConnection => {
                parts.push("Trusted_Connection=yes".to_string());
            }
            AuthMode::Credentials { username, password } => {
                parts.push(format!("UID={}", username));
                if redact {
                    parts.push("PWD=***".to_string());
                } else {
                    parts.push(format!("PWD={}", password));
                }
            }
        }

        parts.push(format!(
            "Encrypt={}",
            if self.security.encrypt { "yes" } else { "no" }
        ));
        parts.push(format!(
            "TrustServerCertificate={}",
            if self.security.trust_server_certificate {
                "yes"
            } else {
                "no"
            }
        ));
        parts.push(format!(
            "Connection Timeout={}",
            self.security.connect_timeout.as_secs()
        ));
        parts.push(format!(
            "Command Timeout={}",
            self.security.command_timeout.as_secs()
        ));

        if let Some(path) = &self.security.certificate_path {
            parts.push(format!("Certificate={}", path.display()));
        }

        parts.join(";")
    }
}

/// Builder for [`ConnectionConfig`].
///
/// Validation happens in [`ConnectionConfigBuilder::build`], before any
/// connection attempt.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    driver: Option<String>,
    server: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    trusted_connection: bool,
    security: Option<SecuritySettings>,
    pool: Option<PoolBounds>,
    acquire_timeout: Option<Duration>,
}

impl ConnectionConfigBuilder {
    /// Driver display name. Defaults to `ODBC Driver 18 for SQL Server`.
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Server host.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Username/password credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Username only (useful when sourcing the two halves separately).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Password only.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enable trusted-connection mode.
    pub fn trusted_connection(mut self, trusted: bool) -> Self {
        self.trusted_connection = trusted;
        self
    }

    /// Transport security settings.
    pub fn security(mut self, security: SecuritySettings) -> Self {
        self.security = Some(security);
        self
    }

    /// Pool bounds.
    pub fn pool(mut self, pool: PoolBounds) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Validate and construct the configuration.
    pub fn build(self) -> Result<ConnectionConfig, ConfigError> {
        let auth = match (self.username, self.password, self.trusted_connection) {
            (Some(_), _, true) | (_, Some(_), true) => return Err(ConfigError::AmbiguousAuth),
            (None, None, true) => AuthMode::TrustedConnection,
            (Some(username), Some(password), false) => AuthMode::Credentials { username, password },
            (Some(_), None, false) | (None, Some(_), false) => {
                return Err(ConfigError::IncompleteCredentials);
            }
            (None, None, false) => return Err(ConfigError::MissingAuth),
        };

        let server = self.server.unwrap_or_else(|| "localhost".to_string());
        let server = HostAddress::new(server.clone()).ok_or(ConfigError::InvalidField {
            field: "server host",
            reason: format!("'{}' is not a valid host address", server),
        })?;

        let database = self.database.ok_or(ConfigError::InvalidField {
            field: "database name",
            reason: "database name is required".to_string(),
        })?;
        let database = DatabaseName::new(database.clone()).ok_or(ConfigError::InvalidField {
            field: "database name",
            reason: format!("'{}' contains invalid characters or length", database),
        })?;

        let driver = self
            .driver
            .unwrap_or_else(|| "ODBC Driver 18 for SQL Server".to_string());
        if driver.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "driver",
                reason: "driver name cannot be empty".to_string(),
            });
        }

        Ok(ConnectionConfig {
            driver,
            server,
            port: self.port,
            database,
            auth,
            security: self.security.unwrap_or_default(),
            pool: self.pool.unwrap_or_default(),
            acquire_timeout: self.acquire_timeout.unwrap_or(Duration::from_secs(30)),
        })
    }
}
