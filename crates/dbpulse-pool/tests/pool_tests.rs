//! Integration tests for the connection pool, using a mock backend that can
//! simulate refused connections, transient failures, and slow round-trips.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use dbpulse_core::config::{PoolBounds, PoolSize};
use dbpulse_core::error::AcquireError;
use dbpulse_core::health::HealthState;
use dbpulse_pool::{ConnectError, Connection, ConnectionPool, Connector, PoolSettings};

#[derive(Default)]
struct MockState {
    next_id: AtomicUsize,
    connect_calls: AtomicUsize,
    refuse_connects: AtomicBool,
    fail_next_connects: AtomicUsize,
    ping_delay_ms: AtomicU64,
    fail_pings: AtomicBool,
}

struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

struct MockConnection {
    id: usize,
    state: Arc<MockState>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn ping(&mut self) -> Result<(), ConnectError> {
        let delay = self.state.ping_delay_ms.load(Ordering::Acquire);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.state.fail_pings.load(Ordering::Acquire) {
            Err(ConnectError::new("simulated round-trip failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Conn = MockConnection;

    async fn connect(&self) -> Result<MockConnection, ConnectError> {
        self.state.connect_calls.fetch_add(1, Ordering::AcqRel);

        if self.state.refuse_connects.load(Ordering::Acquire) {
            return Err(ConnectError::new("connection refused"));
        }

        let failures_left = self.state.fail_next_connects.load(Ordering::Acquire);
        if failures_left > 0 {
            self.state
                .fail_next_connects
                .store(failures_left - 1, Ordering::Release);
            return Err(ConnectError::new("transient connect failure"));
        }

        Ok(MockConnection {
            id: self.state.next_id.fetch_add(1, Ordering::AcqRel),
            state: Arc::clone(&self.state),
        })
    }
}

fn settings(max: u8) -> PoolSettings {
    PoolSettings::default()
        .with_bounds(PoolBounds::new(0, PoolSize::new(max).unwrap()).unwrap())
        .with_backoff_base(Duration::from_millis(10))
}

#[tokio::test]
async fn acquire_hands_out_distinct_connections() {
    let (connector, _state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(2));

    let first = pool.acquire(Duration::from_secs(1)).await.unwrap();
    let second = pool.acquire(Duration::from_secs(1)).await.unwrap();
    assert_ne!(first.connection().id, second.connection().id);

    pool.release(first, true).await;
    pool.release(second, true).await;
}

#[tokio::test]
async fn three_callers_two_slots_third_times_out() {
    let (connector, _state) = MockConnector::new();
    let pool = Arc::new(ConnectionPool::new(connector, settings(2)));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..3 {
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            let started = Instant::now();
            match pool.acquire(Duration::from_millis(100)).await {
                Ok(handle) => {
                    // Hold the slot past the third caller's timeout.
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    pool.release(handle, true).await;
                    Ok(())
                }
                Err(err) => Err((err, started.elapsed())),
            }
        });
    }

    let mut succeeded = 0;
    let mut exhausted = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(()) => succeeded += 1,
            Err(failure) => exhausted.push(failure),
        }
    }

    assert_eq!(succeeded, 2);
    assert_eq!(exhausted.len(), 1);
    let (err, waited) = &exhausted[0];
    assert!(matches!(err, AcquireError::PoolExhausted { max: 2, .. }));
    assert!(
        *waited >= Duration::from_millis(100),
        "timed out after {waited:?}, expected >= 100ms"
    );
    assert!(
        *waited < Duration::from_millis(300),
        "timed out after {waited:?}, expected well before slot release"
    );
}

#[tokio::test]
async fn concurrent_handles_never_share_a_connection() {
    let (connector, _state) = MockConnector::new();
    let pool = Arc::new(ConnectionPool::new(connector, settings(3)));
    let held: Arc<tokio::sync::Mutex<HashSet<usize>>> = Arc::default();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..9 {
        let pool = Arc::clone(&pool);
        let held = Arc::clone(&held);
        tasks.spawn(async move {
            let handle = pool.acquire(Duration::from_secs(2)).await.unwrap();
            let id = handle.connection().id;
            assert!(
                held.lock().await.insert(id),
                "connection {id} handed to two concurrent callers"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
            held.lock().await.remove(&id);
            pool.release(handle, true).await;
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }
}

#[tokio::test]
async fn healthy_release_reuses_the_connection() {
    let (connector, state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(2));

    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    let id = handle.connection().id;
    pool.release(handle, true).await;

    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    assert_eq!(handle.connection().id, id);
    assert_eq!(state.connect_calls.load(Ordering::Acquire), 1);
    pool.release(handle, true).await;
}

#[tokio::test]
async fn unhealthy_release_never_returns_the_destroyed_connection() {
    let (connector, state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(2));

    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    let destroyed = handle.connection().id;
    pool.release(handle, false).await;

    for _ in 0..3 {
        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_ne!(handle.connection().id, destroyed);
        pool.release(handle, false).await;
    }
    assert_eq!(state.connect_calls.load(Ordering::Acquire), 4);
}

#[tokio::test]
async fn transient_connect_failures_are_retried_with_backoff() {
    let (connector, state) = MockConnector::new();
    state.fail_next_connects.store(2, Ordering::Release);
    let pool = ConnectionPool::new(connector, settings(1));

    let started = Instant::now();
    let handle = pool.acquire(Duration::from_secs(2)).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(state.connect_calls.load(Ordering::Acquire), 3);
    // Two backoff waits: 10ms then 20ms.
    assert!(elapsed >= Duration::from_millis(30), "elapsed {elapsed:?}");
    pool.release(handle, true).await;
}

#[tokio::test]
async fn connect_failure_surfaces_after_bounded_attempts() {
    let (connector, state) = MockConnector::new();
    state.refuse_connects.store(true, Ordering::Release);
    let pool = ConnectionPool::new(connector, settings(1).with_connect_attempts(3));

    match pool.acquire(Duration::from_secs(2)).await {
        Err(AcquireError::ConnectFailed { attempts, reason }) => {
            assert_eq!(attempts, 3);
            assert_eq!(reason, "connection refused");
        }
        Err(other) => panic!("expected ConnectFailed, got {other:?}"),
        Ok(_) => panic!("expected ConnectFailed, got a connection"),
    }
    assert_eq!(state.connect_calls.load(Ordering::Acquire), 3);
}

#[tokio::test]
async fn dropped_handle_frees_the_slot() {
    let (connector, _state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(1));

    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    let first = handle.connection().id;
    drop(handle);

    // The dropped connection was closed; a fresh one fills the slot.
    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    assert_ne!(handle.connection().id, first);
    pool.release(handle, true).await;
}

#[tokio::test]
async fn acquire_returns_promptly_when_idle_validation_hangs() {
    let (connector, state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(2));

    // Seed one idle connection, then wedge round-trips.
    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    pool.release(handle, true).await;
    state.ping_delay_ms.store(5_000, Ordering::Release);

    let started = Instant::now();
    let result = pool.acquire(Duration::from_millis(100)).await;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(500),
        "acquire held past its timeout: {elapsed:?}"
    );
    match result {
        Err(AcquireError::ConnectFailed { reason, .. }) => {
            assert!(reason.contains("validation timed out"), "reason: {reason}");
        }
        Err(other) => panic!("expected validation timeout, got {other:?}"),
        Ok(_) => panic!("expected validation timeout, got a connection"),
    }
    // The wedged connection was destroyed, freeing its slot.
    assert_eq!(pool.stats().await.live, 0);
}

#[tokio::test]
async fn warm_pre_establishes_minimum_connections() {
    let (connector, state) = MockConnector::new();
    let settings = PoolSettings::default()
        .with_bounds(PoolBounds::new(2, PoolSize::new(3).unwrap()).unwrap());
    let pool = ConnectionPool::new(connector, settings);

    pool.warm().await.unwrap();

    let stats = pool.stats().await;
    assert_eq!(stats.live, 2);
    assert_eq!(stats.idle, 2);
    assert_eq!(stats.active, 0);
    assert_eq!(state.connect_calls.load(Ordering::Acquire), 2);
}

#[tokio::test]
async fn probe_reports_up_with_latency() {
    let (connector, _state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(2));

    let report = pool.probe().await;
    assert_eq!(report.state, HealthState::Up);
    assert!(report.latency_ms.is_some());
    assert!(report.detail.is_none());

    let stats = report.pool.expect("probe attaches pool stats");
    assert_eq!(stats.live, 1);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn probe_reports_degraded_over_latency_threshold() {
    let (connector, state) = MockConnector::new();
    state.ping_delay_ms.store(50, Ordering::Release);
    let pool = ConnectionPool::new(
        connector,
        settings(2).with_degraded_threshold(Duration::from_millis(10)),
    );

    let report = pool.probe().await;
    assert_eq!(report.state, HealthState::Degraded);
    assert!(report.detail.unwrap().contains("threshold"));
    // Reachable-but-slow keeps the connection.
    assert_eq!(pool.stats().await.live, 1);
}

#[tokio::test]
async fn probe_reports_down_when_unreachable() {
    let (connector, state) = MockConnector::new();
    state.refuse_connects.store(true, Ordering::Release);
    let pool = ConnectionPool::new(
        connector,
        settings(2)
            .with_connect_attempts(2)
            .with_probe_timeout(Duration::from_millis(500)),
    );

    let report = pool.probe().await;
    assert_eq!(report.state, HealthState::Down);
    assert!(report.detail.is_some());
}

#[tokio::test]
async fn probe_destroys_connection_on_failed_roundtrip() {
    let (connector, state) = MockConnector::new();
    state.fail_pings.store(true, Ordering::Release);
    let pool = ConnectionPool::new(connector, settings(2));

    let report = pool.probe().await;
    assert_eq!(report.state, HealthState::Down);
    assert_eq!(pool.stats().await.live, 0);
}

#[tokio::test]
async fn probe_stays_within_its_budget_when_roundtrip_hangs() {
    let (connector, state) = MockConnector::new();
    state.ping_delay_ms.store(5_000, Ordering::Release);
    let pool = ConnectionPool::new(
        connector,
        settings(2).with_probe_timeout(Duration::from_millis(200)),
    );

    let started = Instant::now();
    let report = pool.probe().await;
    let elapsed = started.elapsed();

    assert_eq!(report.state, HealthState::Down);
    // Acquire and round-trip share one budget; the whole probe stays near
    // it rather than doubling it.
    assert!(
        elapsed < Duration::from_millis(600),
        "probe overran its budget: {elapsed:?}"
    );
    assert_eq!(pool.stats().await.live, 0);
}

#[tokio::test]
async fn shutdown_drains_idle_and_refuses_new_acquires() {
    let (connector, _state) = MockConnector::new();
    let pool = ConnectionPool::new(connector, settings(2));

    let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
    pool.release(handle, true).await;
    assert_eq!(pool.stats().await.live, 1);

    pool.shutdown().await;
    assert_eq!(pool.stats().await.live, 0);

    match pool.acquire(Duration::from_millis(100)).await {
        Err(AcquireError::PoolClosed) => {}
        Err(other) => panic!("expected PoolClosed, got {other:?}"),
        Ok(_) => panic!("expected PoolClosed, got a connection"),
    }
}
