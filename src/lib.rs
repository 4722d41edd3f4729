//! # dbpulse
//!
//! Database connectivity and health-monitoring core: architecture-aware
//! driver provisioning, a bounded connection pool with health probing, and
//! an HTTP health surface.
//!
//! The workspace splits along failure-domain lines:
//!
//! - [`dbpulse_core`] — validated configuration, error taxonomy, health
//!   report types.
//! - [`dbpulse_driver`] — resolves the native driver artifact for the host
//!   CPU and verifies it is installed before the process accepts traffic.
//! - [`dbpulse_pool`] — the connection supervisor: bounded acquire/release,
//!   backoff on establishment, bounded probes, graceful drain.
//! - [`dbpulse_http`] — liveness and database-readiness endpoints.
//!
//! This crate ties them together into a runnable service: environment
//! configuration, tracing setup, and signal-driven shutdown.

pub mod settings;
pub mod shutdown;

pub use dbpulse_core::{config, error, health};
pub use dbpulse_driver as driver;
pub use dbpulse_http as http;
pub use dbpulse_pool as pool;

pub use settings::{LogFormat, RuntimeSettings, Settings};
pub use shutdown::shutdown_signal;
