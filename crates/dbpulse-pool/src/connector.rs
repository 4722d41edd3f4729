//! Backend seam: how the pool establishes and validates connections.

use async_trait::async_trait;

/// A sanitized connection-level failure.
///
/// Reasons are operator-facing strings; backends must strip credentials and
/// other sensitive detail before constructing one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ConnectError {
    reason: String,
}

impl ConnectError {
    /// Create an error with the given sanitized reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A live connection to the database.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Minimal round-trip validating the connection end to end
    /// (`SELECT 1` equivalent).
    async fn ping(&mut self) -> Result<(), ConnectError>;
}

/// Establishes fresh connections for the pool.
///
/// Dropping a pending `connect` future must tear down any partially
/// established resources; the pool relies on this to avoid orphaning
/// half-established connections when an acquire times out.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type this backend produces.
    type Conn: Connection;

    /// Establish a fresh connection.
    async fn connect(&self) -> Result<Self::Conn, ConnectError>;
}
