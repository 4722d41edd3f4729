//! # dbpulse Pool
//!
//! The Connection Supervisor: a bounded pool of database connections with
//! lazy establishment, exponential backoff on failed establishment, and a
//! synchronous `probe()` used by health checks.
//!
//! The wire backend sits behind the [`Connector`] trait so the pool's
//! lifecycle guarantees hold for any relational backend. A `tokio-postgres`
//! backend ships behind the `postgres` feature.
//!
//! # Guarantees
//!
//! - A connection is never shared by two concurrent callers.
//! - The pool never exceeds its configured maximum of live connections.
//! - A connection that fails validation is destroyed, never re-idled.
//! - `acquire` returns promptly on timeout; a timed-out establishment tears
//!   down its partial resources before the error returns.

pub mod connector;
pub mod pool;
pub mod settings;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use connector::{ConnectError, Connection, Connector};
pub use pool::{ConnectionPool, PooledConnection};
pub use settings::PoolSettings;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresConnector};
