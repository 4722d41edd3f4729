//! PostgreSQL backend for the pool (`postgres` feature).
//!
//! A thin [`Connector`] over `tokio-postgres`. Errors are sanitized before
//! they leave this module; raw driver messages can embed connection-string
//! fragments.

use async_trait::async_trait;
use tokio_postgres::{Client, Config as PgConfig, Error as PgError, NoTls};
use tracing::debug;

use dbpulse_core::config::{AuthMode, ConnectionConfig};
use dbpulse_core::error::ConfigError;

use crate::connector::{ConnectError, Connection, Connector};

/// Connector producing `tokio-postgres` clients.
#[derive(Debug)]
pub struct PostgresConnector {
    config: PgConfig,
}

impl PostgresConnector {
    /// Wrap an existing `tokio-postgres` config.
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    /// Build a connector from the validated connection config.
    ///
    /// Trusted-connection mode has no PostgreSQL equivalent and is rejected
    /// here, at startup, rather than on first connect.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, ConfigError> {
        let mut pg = PgConfig::new();
        pg.host(config.server().as_str());
        if let Some(port) = config.port() {
            pg.port(port);
        }
        pg.dbname(config.database().as_str());
        pg.application_name("dbpulse");
        pg.connect_timeout(config.security().connect_timeout);

        match config.auth() {
            AuthMode::Credentials { username, password } => {
                pg.user(username);
                pg.password(password);
            }
            AuthMode::TrustedConnection => {
                return Err(ConfigError::InvalidField {
                    field: "auth mode",
                    reason: "trusted connection is not supported by the postgres backend"
                        .to_string(),
                });
            }
        }

        Ok(Self { config: pg })
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    type Conn = PostgresConnection;

    async fn connect(&self) -> Result<PostgresConnection, ConnectError> {
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|e| ConnectError::new(sanitize(&e)))?;

        // The connection object drives the socket; it ends when the client
        // drops.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "postgres connection task ended");
            }
        });

        Ok(PostgresConnection { client })
    }
}

/// A pooled `tokio-postgres` client.
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Access the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn ping(&mut self) -> Result<(), ConnectError> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|e| ConnectError::new(sanitize(&e)))
    }
}

fn sanitize(error: &PgError) -> String {
    if error.as_db_error().is_some() {
        "database operation failed".to_string()
    } else if error.to_string().contains("authentication") {
        "authentication failed".to_string()
    } else if error.to_string().contains("timeout") {
        "operation timed out".to_string()
    } else if error.to_string().contains("connection") {
        "connection failed".to_string()
    } else {
        "database error occurred".to_string()
    }
}
