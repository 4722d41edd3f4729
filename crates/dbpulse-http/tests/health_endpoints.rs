//! Endpoint tests for the health router, with the probe stubbed out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use dbpulse_core::health::{HealthCheck, HealthReport, PoolStats};
use dbpulse_http::{HealthRouterState, ServiceInfo, router};

struct StubChecker {
    report: HealthReport,
}

#[async_trait]
impl HealthCheck for StubChecker {
    async fn probe(&self) -> HealthReport {
        self.report.clone()
    }
}

fn app(report: HealthReport) -> Router {
    router(HealthRouterState::new(
        Arc::new(StubChecker { report }),
        ServiceInfo::new("dbpulse", "0.1.0"),
    ))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn liveness_serves_200_even_when_database_is_down() {
    let app = app(HealthReport::down("database", "connection refused"));

    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["service"], "dbpulse");
    assert_eq!(body["version"], "0.1.0");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn database_health_up_serves_200_with_report() {
    let report = HealthReport::up("database")
        .with_latency(Duration::from_millis(12))
        .with_pool_stats(PoolStats::new(2, 1, 5));
    let (status, body) = get_json(app(report), "/health/db").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "up");
    assert_eq!(body["latency_ms"], 12);
    assert_eq!(body["pool"]["live"], 2);
    assert_eq!(body["pool"]["idle"], 1);
    assert_eq!(body["pool"]["max"], 5);
}

#[tokio::test]
async fn database_health_degraded_still_serves_200() {
    let report = HealthReport::degraded("database", "round-trip took 480ms (threshold 250ms)")
        .with_latency(Duration::from_millis(480));
    let (status, body) = get_json(app(report), "/health/db").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "degraded");
    assert!(body["detail"].as_str().unwrap().contains("threshold"));
}

#[tokio::test]
async fn database_health_down_serves_503() {
    let report = HealthReport::down("database", "connection pool exhausted");
    let (status, body) = get_json(app(report), "/health/db").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["state"], "down");
    assert_eq!(body["detail"], "connection pool exhausted");
}
