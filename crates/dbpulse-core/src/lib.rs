//! # dbpulse Core
//!
//! Shared vocabulary for the dbpulse connectivity core: validated
//! configuration types, the error taxonomy, and health report types.
//!
//! The types here enforce their invariants at construction time
//! (parse-don't-validate), so downstream crates never re-check them.

pub mod config;
pub mod error;
pub mod health;

pub use config::{
    AuthMode, ConnectionConfig, ConnectionConfigBuilder, DatabaseName, HostAddress, PoolBounds,
    PoolSize, SecuritySettings,
};
pub use error::{AcquireError, ConfigError, ProvisionError};
pub use health::{HealthCheck, HealthReport, HealthState, PoolStats};
