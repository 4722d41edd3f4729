//! The Connection Supervisor.
//!
//! Owns a bounded set of connections, growing lazily up to the configured
//! maximum. Slots are accounted with a semaphore (one permit per checked-out
//! connection); idle connections live in a mutex-guarded list and are
//! validated with a round-trip before reuse.
//!
//! Per-connection lifecycle:
//! `UNINITIALIZED → CONNECTING → IDLE ⇄ CHECKED_OUT → (IDLE | CLOSED)`.
//! Failed establishment goes straight to CLOSED; a closed connection leaves
//! the live count so a fresh replacement can be created under the same
//! bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time;
use tracing::{debug, info, warn};

use dbpulse_core::error::AcquireError;
use dbpulse_core::health::{HealthCheck, HealthReport, PoolStats};

use crate::connector::{Connection, Connector};
use crate::settings::PoolSettings;

struct PoolInner<C: Connector> {
    connector: C,
    settings: PoolSettings,
    /// One permit per slot; holding a permit entitles the holder to one
    /// checked-out connection. Closed on shutdown.
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<C::Conn>>,
    /// Idle + checked-out connections. Never exceeds `bounds.max`.
    live: AtomicUsize,
}

/// A connection checked out from the pool.
///
/// Owned by exactly one caller. Return it with
/// [`ConnectionPool::release`]; a handle dropped without release is
/// reported and treated as an unhealthy release so the slot is never
/// leaked.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Conn>,
    _permit: Option<OwnedSemaphorePermit>,
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> PooledConnection<C> {
    /// Access the underlying connection.
    pub fn connection(&self) -> &C::Conn {
        self.conn.as_ref().expect("connection present until release")
    }

    /// Mutably access the underlying connection.
    pub fn connection_mut(&mut self) -> &mut C::Conn {
        self.conn.as_mut().expect("connection present until release")
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        // release() takes the connection out first; reaching here with one
        // still inside means the caller dropped the handle without
        // releasing it.
        if let Some(conn) = self.conn.take() {
            warn!(
                component = %self.inner.settings.component,
                "connection handle dropped without release; closing connection"
            );
            self.inner.live.fetch_sub(1, Ordering::AcqRel);
            drop(conn);
        }
        // The permit drops with the handle, freeing the slot either way.
    }
}

/// Bounded connection pool with health probing.
///
/// One instance exists per process, constructed after the driver
/// provisioner succeeds and shared by handle with all callers. Cloning is
/// cheap (reference-counted).
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Create an empty pool. No connection is established until the first
    /// `acquire` (or an explicit [`Self::warm`]).
    pub fn new(connector: C, settings: PoolSettings) -> Self {
        let max = settings.bounds.max.get();
        Self {
            inner: Arc::new(PoolInner {
                connector,
                settings,
                slots: Arc::new(Semaphore::new(max)),
                idle: Mutex::new(Vec::with_capacity(max)),
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Pre-establish the configured minimum number of connections.
    ///
    /// Intended for startup; failures here are recoverable because the pool
    /// grows lazily anyway.
    pub async fn warm(&self) -> Result<(), AcquireError> {
        let min = self.inner.settings.bounds.min as usize;
        if min == 0 {
            return Ok(());
        }

        let mut handles = Vec::with_capacity(min);
        for _ in 0..min {
            handles.push(self.acquire(self.inner.settings.acquire_timeout).await?);
        }
        for handle in handles {
            self.release(handle, true).await;
        }

        info!(
            component = %self.inner.settings.component,
            connections = min,
            "pool pre-warmed"
        );
        Ok(())
    }

    /// Acquire a connection, waiting up to `timeout` for a free slot.
    ///
    /// Prefers a validated idle connection; establishes a fresh one (with
    /// bounded backoff retries) only when none is available. Returns
    /// [`AcquireError::PoolExhausted`] when the bound is reached and no slot
    /// frees within the timeout.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection<C>, AcquireError> {
        let started = Instant::now();

        let permit =
            match time::timeout(timeout, Arc::clone(&self.inner.slots).acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(AcquireError::PoolClosed),
                Err(_) => {
                    let stats = self.stats().await;
                    debug!(
                        component = %self.inner.settings.component,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "acquire timed out waiting for a slot"
                    );
                    return Err(AcquireError::PoolExhausted {
                        active: stats.active,
                        max: stats.max,
                    });
                }
            };

        // Reuse an idle connection when a healthy one is available. A
        // connection failing validation is destroyed, never handed out.
        // Validation shares the caller's timeout: a wedged connection must
        // not hold acquire past its deadline.
        loop {
            let candidate = { self.inner.idle.lock().await.pop() };
            let Some(mut conn) = candidate else { break };

            let remaining = timeout.saturating_sub(started.elapsed());
            match time::timeout(remaining, conn.ping()).await {
                Ok(Ok(())) => {
                    return Ok(PooledConnection {
                        conn: Some(conn),
                        _permit: Some(permit),
                        inner: Arc::clone(&self.inner),
                    });
                }
                Ok(Err(_)) => {
                    self.inner.live.fetch_sub(1, Ordering::AcqRel);
                    debug!(
                        component = %self.inner.settings.component,
                        "idle connection failed validation and was discarded"
                    );
                }
                Err(_) => {
                    self.inner.live.fetch_sub(1, Ordering::AcqRel);
                    drop(conn);
                    warn!(
                        component = %self.inner.settings.component,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "idle connection validation timed out; connection destroyed"
                    );
                    return Err(AcquireError::ConnectFailed {
                        attempts: 0,
                        reason: "idle connection validation timed out".to_string(),
                    });
                }
            }
        }

        let budget = timeout.saturating_sub(started.elapsed());
        let conn = self.establish(budget).await?;
        self.inner.live.fetch_add(1, Ordering::AcqRel);

        Ok(PooledConnection {
            conn: Some(conn),
            _permit: Some(permit),
            inner: Arc::clone(&self.inner),
        })
    }

    /// Establish a fresh connection within `budget`, retrying with
    /// exponential backoff up to the configured attempt bound. Retries are
    /// silent; only the final failure is logged and surfaced.
    async fn establish(&self, budget: Duration) -> Result<C::Conn, AcquireError> {
        let deadline = Instant::now() + budget;
        let max_attempts = self.inner.settings.connect_attempts.max(1);
        let mut delay = self.inner.settings.backoff_base;
        let mut attempts = 0u32;
        let mut last_reason = "connection budget exhausted".to_string();

        while attempts < max_attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            match time::timeout(remaining, self.inner.connector.connect()).await {
                Ok(Ok(conn)) => {
                    if attempts > 1 {
                        info!(
                            component = %self.inner.settings.component,
                            attempt = attempts,
                            "database connection established after retry"
                        );
                    } else {
                        debug!(
                            component = %self.inner.settings.component,
                            "database connection established"
                        );
                    }
                    return Ok(conn);
                }
                Ok(Err(err)) => {
                    last_reason = err.to_string();
                }
                Err(_) => {
                    // The pending connect future is dropped here, tearing
                    // down its partial resources before we report failure.
                    last_reason = "connection establishment timed out".to_string();
                    break;
                }
            }

            if attempts < max_attempts {
                let wait = delay.min(deadline.saturating_duration_since(Instant::now()));
                if wait.is_zero() {
                    break;
                }
                time::sleep(wait).await;
                delay = delay.saturating_mul(2);
            }
        }

        warn!(
            component = %self.inner.settings.component,
            attempts,
            reason = %last_reason,
            "failed to establish database connection"
        );
        Err(AcquireError::ConnectFailed {
            attempts,
            reason: last_reason,
        })
    }

    /// Return a connection to the pool.
    ///
    /// Healthy connections go back to the idle list; unhealthy ones are
    /// destroyed and their slot freed so a future `acquire` can create a
    /// replacement. Consuming the handle makes double-release and
    /// release-without-acquire unrepresentable.
    pub async fn release(&self, mut handle: PooledConnection<C>, healthy: bool) {
        let Some(conn) = handle.conn.take() else {
            return;
        };

        if healthy {
            // Push before the permit frees (when `handle` drops) so the
            // live count can never observably exceed the bound.
            self.inner.idle.lock().await.push(conn);
            debug!(
                component = %self.inner.settings.component,
                "connection returned to idle pool"
            );
        } else {
            self.inner.live.fetch_sub(1, Ordering::AcqRel);
            drop(conn);
            debug!(
                component = %self.inner.settings.component,
                "unhealthy connection destroyed"
            );
        }
    }

    /// Run a single bounded health probe.
    ///
    /// Acquires with the probe budget, issues the validation round-trip,
    /// and releases. Reports `Up`, `Degraded` (round-trip over the latency
    /// threshold), or `Down`. Never retries and never errors past the
    /// caller. Probes compete fairly for pool capacity; no slot is
    /// reserved for them.
    pub async fn probe(&self) -> HealthReport {
        let component = self.inner.settings.component.clone();
        let probe_timeout = self.inner.settings.probe_timeout;
        let threshold = self.inner.settings.degraded_threshold;
        let probe_started = Instant::now();

        let report = match self.acquire(probe_timeout).await {
            Err(err) => {
                warn!(component = %component, error = %err, "health probe failed to acquire");
                HealthReport::down(&component, err.to_string())
            }
            Ok(mut handle) => {
                // The acquire may have spent part of the budget; the
                // round-trip gets only what is left.
                let remaining = probe_timeout.saturating_sub(probe_started.elapsed());
                let started = Instant::now();
                let outcome = time::timeout(remaining, handle.connection_mut().ping()).await;
                let latency = started.elapsed();

                match outcome {
                    Ok(Ok(())) => {
                        self.release(handle, true).await;
                        if latency > threshold {
                            debug!(
                                component = %component,
                                latency_ms = latency.as_millis() as u64,
                                "probe round-trip exceeded degraded threshold"
                            );
                            HealthReport::degraded(
                                &component,
                                format!(
                                    "round-trip took {}ms (threshold {}ms)",
                                    latency.as_millis(),
                                    threshold.as_millis()
                                ),
                            )
                            .with_latency(latency)
                        } else {
                            HealthReport::up(&component).with_latency(latency)
                        }
                    }
                    Ok(Err(err)) => {
                        self.release(handle, false).await;
                        warn!(component = %component, error = %err, "probe round-trip failed");
                        HealthReport::down(&component, err.to_string())
                    }
                    Err(_) => {
                        self.release(handle, false).await;
                        warn!(component = %component, "probe round-trip timed out");
                        HealthReport::down(&component, "validation round-trip timed out")
                    }
                }
            }
        };

        report.with_pool_stats(self.stats().await)
    }

    /// Point-in-time pool statistics.
    pub async fn stats(&self) -> PoolStats {
        let idle = self.inner.idle.lock().await.len();
        let live = self.inner.live.load(Ordering::Acquire);
        PoolStats::new(live, idle, self.inner.settings.bounds.max.get())
    }

    /// Drain the pool at process shutdown.
    ///
    /// New acquires fail immediately; checked-out connections get
    /// `drain_timeout` to come back, then the pool closes whatever is idle
    /// and abandons the rest.
    pub async fn shutdown(&self) {
        self.inner.slots.close();
        let deadline = Instant::now() + self.inner.settings.drain_timeout;

        loop {
            let idle = self.inner.idle.lock().await.len();
            let live = self.inner.live.load(Ordering::Acquire);
            if live <= idle {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    component = %self.inner.settings.component,
                    outstanding = live - idle,
                    "drain timeout reached; abandoning checked-out connections"
                );
                break;
            }
            time::sleep(Duration::from_millis(50)).await;
        }

        let drained: Vec<C::Conn> = {
            let mut idle = self.inner.idle.lock().await;
            idle.drain(..).collect()
        };
        self.inner.live.fetch_sub(drained.len(), Ordering::AcqRel);
        let closed = drained.len();
        drop(drained);

        info!(
            component = %self.inner.settings.component,
            closed,
            "connection pool shut down"
        );
    }
}

#[async_trait::async_trait]
impl<C: Connector> HealthCheck for ConnectionPool<C> {
    async fn probe(&self) -> HealthReport {
        ConnectionPool::probe(self).await
    }
}
