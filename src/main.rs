//! dbpulse service binary.
//!
//! Startup order is deliberate: configuration is validated first, then the
//! driver provisioner runs, and only after both succeed does the process
//! bind its listener. A missing or mismatched driver never gets as far as
//! accepting traffic.

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dbpulse::settings::{LogFormat, Settings};
use dbpulse_core::error::{ConfigError, ProvisionError};

#[derive(Debug, Parser)]
#[command(
    name = "dbpulse",
    version,
    about = "Database connectivity and health-monitoring service"
)]
struct Args {
    /// Validate configuration and driver provisioning, then exit.
    #[arg(long)]
    check: bool,

    /// Listen address, overriding DBPULSE_BIND.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[derive(Debug, thiserror::Error)]
enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env("DBPULSE_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("dbpulse: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServiceError> {
    let args = Args::parse();

    let mut settings = Settings::from_env()?;
    if let Some(bind) = args.bind {
        settings.runtime.bind = bind;
    }
    init_tracing(settings.runtime.log_format);

    let profile = dbpulse_driver::resolve(settings.connection.driver())?;
    match settings.runtime.driver_search_roots.as_deref() {
        Some(roots) => profile.verify(roots)?,
        None => profile.verify_installed()?,
    }

    info!(
        artifact = %profile.artifact_id(),
        connection = %settings.connection.redacted_connection_string(),
        "startup checks passed"
    );

    if args.check {
        info!("configuration and driver check passed");
        return Ok(());
    }

    serve(settings).await
}

#[cfg(feature = "postgres")]
async fn serve(settings: Settings) -> Result<(), ServiceError> {
    use std::sync::Arc;

    use dbpulse_http::{HealthRouterState, ServiceInfo};
    use dbpulse_pool::{ConnectionPool, PostgresConnector};
    use tracing::warn;

    let connector = PostgresConnector::from_config(&settings.connection)?;
    let pool = ConnectionPool::new(connector, settings.pool.clone());

    if settings.pool.bounds.min > 0 {
        // The pool grows lazily anyway; a failed pre-warm is not fatal.
        if let Err(err) = pool.warm().await {
            warn!(error = %err, "pool pre-warm failed, continuing with lazy establishment");
        }
    }

    let state = HealthRouterState::new(
        Arc::new(pool.clone()),
        ServiceInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    );
    let app = dbpulse_http::router(state);

    let listener = tokio::net::TcpListener::bind(settings.runtime.bind).await?;
    info!(addr = %settings.runtime.bind, "health surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(dbpulse::shutdown_signal())
        .await?;

    pool.shutdown().await;
    Ok(())
}

#[cfg(not(feature = "postgres"))]
async fn serve(_settings: Settings) -> Result<(), ServiceError> {
    Err(ServiceError::Config(ConfigError::InvalidField {
        field: "backend",
        reason: "no database backend compiled in (enable the 'postgres' feature)".to_string(),
    }))
}
