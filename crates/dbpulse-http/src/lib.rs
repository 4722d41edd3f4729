//! HTTP health surface.
//!
//! Two endpoints, one per question an orchestrator asks:
//!
//! - `GET /health` — process liveness. Always 200, never touches the
//!   database.
//! - `GET /health/db` — database readiness. Runs a single bounded pool
//!   probe and maps its state onto the status code: `up` and `degraded`
//!   serve 200 (degraded carries a warning detail in the body), `down`
//!   serves 503 so load balancers stop routing traffic.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use dbpulse_core::health::{HealthCheck, HealthState};

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Identity the liveness endpoint reports.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Shared state for the health router.
#[derive(Clone)]
pub struct HealthRouterState {
    checker: Arc<dyn HealthCheck>,
    service: ServiceInfo,
}

impl HealthRouterState {
    pub fn new(checker: Arc<dyn HealthCheck>, service: ServiceInfo) -> Self {
        Self { checker, service }
    }
}

/// Build the health router. The process start time is recorded on first
/// call and reported as uptime by the liveness endpoint.
pub fn router(state: HealthRouterState) -> Router {
    START_TIME.get_or_init(Instant::now);

    Router::new()
        .route("/health", get(liveness))
        .route("/health/db", get(database_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    service: String,
    version: String,
    timestamp: DateTime<Utc>,
    uptime_seconds: u64,
}

/// Process liveness. Deliberately independent of the database: a service
/// with an unreachable database is alive, just not ready.
async fn liveness(State(state): State<HealthRouterState>) -> Json<LivenessResponse> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(LivenessResponse {
        status: "up",
        service: state.service.name.clone(),
        version: state.service.version.clone(),
        timestamp: Utc::now(),
        uptime_seconds: uptime,
    })
}

/// Database readiness. The full probe report is the response body.
async fn database_health(State(state): State<HealthRouterState>) -> Response {
    let report = state.checker.probe().await;

    let status = match report.state {
        HealthState::Up => StatusCode::OK,
        HealthState::Degraded => {
            warn!(
                component = %report.component,
                detail = report.detail.as_deref().unwrap_or("unspecified"),
                "database is degraded"
            );
            StatusCode::OK
        }
        HealthState::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(report)).into_response()
}
