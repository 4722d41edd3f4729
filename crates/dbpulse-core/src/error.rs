//! Error taxonomy for the connectivity core.
//!
//! Two failure classes exist: startup-blocking errors (`ConfigError`,
//! `ProvisionError`) which must prevent the process from accepting traffic,
//! and recoverable errors (`AcquireError`) which callers translate into a
//! service-unavailable response. A failed health probe is not an error at
//! all — it yields a `Down` report (see [`crate::health`]).

/// Errors raised while validating configuration, before any connection
/// attempt is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Credentials and trusted-connection mode were both set.
    #[error("credentials and trusted connection are mutually exclusive")]
    AmbiguousAuth,

    /// Only one half of a username/password pair was provided.
    #[error("username and password must be provided together")]
    IncompleteCredentials,

    /// Neither credentials nor trusted-connection mode was configured.
    #[error("no authentication configured: set credentials or enable trusted connection")]
    MissingAuth,

    /// Minimum pool size exceeds the maximum.
    #[error("invalid pool bounds: min {min} exceeds max {max}")]
    PoolBoundsInverted { min: usize, max: usize },

    /// A configuration field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// An environment variable could not be parsed.
    #[error("invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },
}

/// Fatal errors from driver provisioning at startup.
///
/// Both variants carry the raw detected architecture string so the operator
/// can diagnose the mismatch without reproducing the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// The host CPU architecture is absent from the driver mapping table.
    /// Never silently defaulted.
    #[error("unsupported CPU architecture '{detected}': no database driver artifact is registered for it")]
    UnsupportedArchitecture { detected: String },

    /// The resolved driver artifact is not installed on this host.
    #[error("database driver artifact '{artifact}' for {architecture} is not installed: {reason}")]
    DriverMissing {
        artifact: String,
        architecture: String,
        reason: String,
    },
}

/// Recoverable errors from pool acquisition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The pool bound is reached and no slot freed within the timeout.
    #[error("connection pool exhausted: {active} of {max} connections in use")]
    PoolExhausted { active: usize, max: usize },

    /// Establishing a fresh connection failed after the bounded retry
    /// attempts. The reason is sanitized; it never contains credentials.
    #[error("failed to establish database connection after {attempts} attempt(s): {reason}")]
    ConnectFailed { attempts: u32, reason: String },

    /// The pool has been shut down; no new connections are handed out.
    #[error("connection pool is shut down")]
    PoolClosed,
}
