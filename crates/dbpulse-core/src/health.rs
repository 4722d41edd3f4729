//! Health report types shared by the pool and the HTTP surface.
//!
//! A report is recomputed on every probe and never cached beyond the
//! caller's request. `Degraded` distinguishes "reachable but slow" from a
//! full outage, which matters for load-shedding decisions made by callers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health state of a probed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Component is reachable and responding within the latency threshold.
    Up,
    /// Component is reachable but the round-trip exceeded the threshold.
    Degraded,
    /// Component is unreachable.
    Down,
}

impl HealthState {
    /// Check if the state is fully healthy.
    pub fn is_up(&self) -> bool {
        matches!(self, HealthState::Up)
    }

    /// Check if the component can still serve requests (up or degraded).
    pub fn is_operational(&self) -> bool {
        !matches!(self, HealthState::Down)
    }

    /// Get the state as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Up => "up",
            HealthState::Degraded => "degraded",
            HealthState::Down => "down",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time connection pool statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    /// Live connections (idle + checked out).
    pub live: usize,
    /// Idle connections available for checkout.
    pub idle: usize,
    /// Connections currently checked out.
    pub active: usize,
    /// Configured maximum live connections.
    pub max: usize,
    /// Active connections as a fraction of max (0.0-1.0).
    pub utilization: f64,
}

impl PoolStats {
    /// Build statistics from live/idle counts and the configured bound.
    pub fn new(live: usize, idle: usize, max: usize) -> Self {
        let active = live.saturating_sub(idle);
        let utilization = if max > 0 {
            active as f64 / max as f64
        } else {
            0.0
        };

        Self {
            live,
            idle,
            active,
            max,
            utilization,
        }
    }

    /// Check if every slot is checked out.
    pub fn is_at_capacity(&self) -> bool {
        self.active >= self.max
    }
}

/// Result of a single health probe.
///
/// Ephemeral by design: each probe produces a fresh report with its own
/// `checked_at` timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Name of the probed component (e.g. `"database"`).
    pub component: String,
    /// Probe outcome.
    pub state: HealthState,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
    /// Round-trip latency of the validation query, when one completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Human-readable detail, present for degraded and down states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Pool statistics at probe time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

impl HealthReport {
    /// Create an `Up` report.
    pub fn up(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: HealthState::Up,
            checked_at: Utc::now(),
            latency_ms: None,
            detail: None,
            pool: None,
        }
    }

    /// Create a `Degraded` report with the reason it is not fully healthy.
    pub fn degraded(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: HealthState::Degraded,
            checked_at: Utc::now(),
            latency_ms: None,
            detail: Some(detail.into()),
            pool: None,
        }
    }

    /// Create a `Down` report with the failure detail.
    pub fn down(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: HealthState::Down,
            checked_at: Utc::now(),
            latency_ms: None,
            detail: Some(detail.into()),
            pool: None,
        }
    }

    /// Attach the measured round-trip latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(latency.as_millis() as u64);
        self
    }

    /// Attach pool statistics.
    pub fn with_pool_stats(mut self, stats: PoolStats) -> Self {
        self.pool = Some(stats);
        self
    }
}

/// Trait for components that can be health-probed.
///
/// A probe is synchronous from the caller's point of view, bounded in time,
/// and never fails past the caller: an unreachable backend yields a `Down`
/// report, not an error.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    /// Run a single bounded probe and report the outcome.
    async fn probe(&self) -> HealthReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(HealthState::Up.is_up());
        assert!(HealthState::Up.is_operational());
        assert!(HealthState::Degraded.is_operational());
        assert!(!HealthState::Degraded.is_up());
        assert!(!HealthState::Down.is_operational());
    }

    #[test]
    fn pool_stats_utilization() {
        let stats = PoolStats::new(4, 1, 10);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.utilization, 0.3);
        assert!(!stats.is_at_capacity());

        let full = PoolStats::new(2, 0, 2);
        assert!(full.is_at_capacity());
    }

    #[test]
    fn report_constructors() {
        let report = HealthReport::up("database").with_latency(Duration::from_millis(12));
        assert_eq!(report.state, HealthState::Up);
        assert_eq!(report.latency_ms, Some(12));
        assert!(report.detail.is_none());

        let report = HealthReport::down("database", "connection refused");
        assert_eq!(report.state, HealthState::Down);
        assert_eq!(report.detail.as_deref(), Some("connection refused"));
    }

    #[test]
    fn report_serializes_lowercase_state() {
        let report = HealthReport::degraded("database", "slow round-trip");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "degraded");
        assert_eq!(json["component"], "database");
        assert!(json.get("latency_ms").is_none());
    }
}
