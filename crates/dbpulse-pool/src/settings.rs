//! Pool tuning knobs.

use std::time::Duration;

use dbpulse_core::config::{ConnectionConfig, PoolBounds};

/// Runtime settings for [`crate::ConnectionPool`].
///
/// Defaults keep a worst-case cold probe bounded well under common
/// orchestrator probe periods.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Component name used in health reports and log events.
    pub component: String,
    /// Minimum (pre-warmed) and maximum live connections.
    pub bounds: PoolBounds,
    /// Default wait for a pool slot.
    pub acquire_timeout: Duration,
    /// Bounded establishment attempts before `ConnectFailed` surfaces.
    pub connect_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Budget for a single health probe (acquire + round-trip).
    pub probe_timeout: Duration,
    /// Round-trip latency above which a successful probe reports degraded.
    pub degraded_threshold: Duration,
    /// How long shutdown waits for checked-out connections to return.
    pub drain_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            component: "database".to_string(),
            bounds: PoolBounds::default(),
            acquire_timeout: Duration::from_secs(30),
            connect_attempts: 5,
            backoff_base: Duration::from_millis(100),
            probe_timeout: Duration::from_secs(2),
            degraded_threshold: Duration::from_millis(250),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolSettings {
    /// Take bounds and acquire timeout from a validated connection config.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            bounds: config.pool(),
            acquire_timeout: config.acquire_timeout(),
            ..Self::default()
        }
    }

    /// Set the pool bounds.
    pub fn with_bounds(mut self, bounds: PoolBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set the default acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the bounded establishment attempt count (minimum 1).
    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    /// Set the initial backoff delay.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the probe budget.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the degraded latency threshold.
    pub fn with_degraded_threshold(mut self, threshold: Duration) -> Self {
        self.degraded_threshold = threshold;
        self
    }

    /// Set the shutdown drain budget.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbpulse_core::config::{ConnectionConfig, PoolSize};

    #[test]
    fn defaults_are_bounded() {
        let settings = PoolSettings::default();
        assert_eq!(settings.connect_attempts, 5);
        assert_eq!(settings.backoff_base, Duration::from_millis(100));
        assert_eq!(settings.probe_timeout, Duration::from_secs(2));
        assert_eq!(settings.degraded_threshold, Duration::from_millis(250));
        assert_eq!(settings.bounds.max, PoolSize::default_size());
    }

    #[test]
    fn from_config_takes_bounds_and_timeout() {
        let max = PoolSize::new(7).unwrap();
        let config = ConnectionConfig::builder()
            .server("db.internal")
            .database("orders")
            .trusted_connection(true)
            .pool(PoolBounds::new(2, max).unwrap())
            .acquire_timeout(Duration::from_secs(3))
            .build()
            .unwrap();

        let settings = PoolSettings::from_config(&config);
        assert_eq!(settings.bounds.min, 2);
        assert_eq!(settings.bounds.max.get(), 7);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn connect_attempts_floor_is_one() {
        let settings = PoolSettings::default().with_connect_attempts(0);
        assert_eq!(settings.connect_attempts, 1);
    }
}
