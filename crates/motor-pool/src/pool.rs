//! Bounded connection pool over the blocking driver boundary.
//!
//! Capacity is enforced with a semaphore holding one permit per slot, so a
//! saturated pool suspends the acquiring task rather than the runtime.
//! Handshakes run on blocking workers; all pool bookkeeping (idle set,
//! counters) is mutated only from runtime threads.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task;
use tokio::time;
use tracing::{debug, trace, warn};

use motor_sync::{ConnectOptions, ServerAddress, SyncConnection, SyncDriver};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::lifecycle::ConnectionMetadata;

/// A bounded, lazily-populated pool of driver connections.
///
/// Cheap to clone; clones share the same pool. No connection exists until
/// the first [`Pool::acquire`].
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    driver: Arc<dyn SyncDriver>,
    address: ServerAddress,
    config: PoolConfig,
    connect_options: ConnectOptions,
    /// One permit per connection slot; closed on pool close.
    semaphore: Arc<Semaphore>,
    /// Idle connections, most recently returned last.
    idle: Mutex<Vec<IdleConnection>>,
    /// Physical connections alive or mid-handshake.
    total: AtomicU32,
    next_id: AtomicU64,
}

struct IdleConnection {
    conn: Box<dyn SyncConnection>,
    meta: ConnectionMetadata,
}

/// Holds one unit of `total` for a handshake in flight.
///
/// Decrements on drop unless defused, which keeps the occupancy count
/// honest when an acquire is cancelled mid-handshake. Defused exactly once,
/// when the handshake's connection becomes a [`PooledConnection`] (whose
/// own drop then owns the decrement).
struct SlotReservation {
    pool: Arc<PoolInner>,
    armed: bool,
}

impl SlotReservation {
    fn new(pool: Arc<PoolInner>) -> Self {
        pool.total.fetch_add(1, Ordering::SeqCst);
        Self { pool, armed: true }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if self.armed {
            self.pool.total.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Idle connections ready for checkout.
    pub available: u32,
    /// Connections currently checked out.
    pub in_use: u32,
    /// Total physical connections.
    pub total: u32,
    /// Configured capacity.
    pub max: u32,
}

impl Pool {
    /// Create a pool for `address`.
    ///
    /// Validates the configuration and returns without any network
    /// activity.
    pub fn new(
        driver: Arc<dyn SyncDriver>,
        address: ServerAddress,
        config: PoolConfig,
    ) -> Result<Self> {
        config.validate()?;
        let connect_options = ConnectOptions {
            connect_timeout: config.connect_timeout,
            socket_timeout: config.socket_timeout,
        };
        let semaphore = Arc::new(Semaphore::new(config.max_size as usize));
        Ok(Self {
            inner: Arc::new(PoolInner {
                driver,
                address,
                config,
                connect_options,
                semaphore,
                idle: Mutex::new(Vec::new()),
                total: AtomicU32::new(0),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Check out a connection, establishing one if none are idle and the
    /// pool is under capacity.
    ///
    /// Suspends the calling task while the pool is saturated; no caller
    /// holds more than one slot per outstanding acquire. When
    /// `wait_queue_timeout` is configured the wait is bounded and expiry
    /// fails with [`PoolError::AcquisitionTimeout`].
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let semaphore = Arc::clone(&self.inner.semaphore);
        let permit = match self.inner.config.wait_queue_timeout {
            Some(wait) => time::timeout(wait, semaphore.acquire_owned())
                .await
                .map_err(|_| PoolError::AcquisitionTimeout(wait))?,
            None => semaphore.acquire_owned().await,
        }
        .map_err(|_| PoolError::PoolClosed)?;

        // Fast path: reuse an idle connection.
        if let Some(mut idle) = self.inner.idle.lock().pop() {
            idle.meta.mark_checkout();
            trace!(
                conn_id = idle.meta.id,
                checkouts = idle.meta.checkout_count,
                "reusing idle connection"
            );
            return Ok(PooledConnection {
                conn: Some(idle.conn),
                meta: idle.meta,
                poisoned: false,
                pool: Arc::clone(&self.inner),
                _permit: permit,
            });
        }

        // Slow path: establish a new connection on a blocking worker. The
        // slot is counted while the handshake is in flight; the guard gives
        // it back if this future is dropped at the await below.
        let reservation = SlotReservation::new(Arc::clone(&self.inner));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let driver = Arc::clone(&self.inner.driver);
        let address = self.inner.address.clone();
        let options = self.inner.connect_options.clone();
        debug!(conn_id = id, address = %self.inner.address, "establishing connection");
        let result = match task::spawn_blocking(move || driver.connect(&address, &options)).await {
            Ok(result) => result,
            Err(join) => Err(motor_sync::Error::Internal(format!(
                "connect worker failed: {join}"
            ))),
        };
        match result {
            Ok(conn) => {
                reservation.defuse();
                let mut meta = ConnectionMetadata::new(id);
                meta.mark_checkout();
                Ok(PooledConnection {
                    conn: Some(conn),
                    meta,
                    poisoned: false,
                    pool: Arc::clone(&self.inner),
                    _permit: permit,
                })
            }
            Err(err) => {
                // Dropping the reservation releases the slot so failed
                // handshakes, however many, never shrink the usable pool.
                drop(reservation);
                warn!(conn_id = id, error = %err, "connection establishment failed");
                Err(PoolError::Driver(err))
            }
        }
    }

    /// Close the pool and drop all idle connections.
    ///
    /// Waiting and future acquires fail with [`PoolError::PoolClosed`].
    /// Connections currently checked out are discarded when their handles
    /// drop instead of returning to the idle set.
    pub fn close(&self) {
        self.inner.semaphore.close();
        let drained: Vec<IdleConnection> = {
            let mut idle = self.inner.idle.lock();
            idle.drain(..).collect()
        };
        self.inner
            .total
            .fetch_sub(drained.len() as u32, Ordering::SeqCst);
        debug!(dropped = drained.len(), "pool closed");
    }

    /// Check whether [`Pool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    /// Snapshot of current pool occupancy.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let available = self.inner.idle.lock().len() as u32;
        let total = self.inner.total.load(Ordering::SeqCst);
        PoolStatus {
            available,
            in_use: total.saturating_sub(available),
            total,
            max: self.inner.config.max_size,
        }
    }

    /// The configured capacity.
    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.inner.config.max_size
    }

    /// The address this pool connects to.
    #[must_use]
    pub fn address(&self) -> &ServerAddress {
        &self.inner.address
    }
}

/// Exclusive handle to a checked-out connection.
///
/// The connection returns to the idle set when the handle drops, unless it
/// was poisoned (or the pool closed in the meantime), in which case it is
/// discarded and its slot freed for a fresh connection.
pub struct PooledConnection {
    conn: Option<Box<dyn SyncConnection>>,
    meta: ConnectionMetadata,
    poisoned: bool,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Take the raw connection, e.g. to move it onto a blocking worker.
    ///
    /// Pair with [`PooledConnection::restore`]. Dropping the handle while
    /// the connection is still out only fixes the bookkeeping; the slot is
    /// freed and the connection, wherever it ended up, is abandoned.
    #[must_use]
    pub fn take(&mut self) -> Option<Box<dyn SyncConnection>> {
        self.conn.take()
    }

    /// Put the raw connection back after use on a worker.
    pub fn restore(&mut self, conn: Box<dyn SyncConnection>) {
        self.conn = Some(conn);
    }

    /// Mark the connection as unusable so it is discarded instead of
    /// returning to the idle set.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    /// Bookkeeping id of this physical connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    /// How many times this physical connection has been checked out.
    #[must_use]
    pub fn checkout_count(&self) -> u64 {
        self.meta.checkout_count
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The connection itself is an opaque trait object; the metadata is
        // what identifies the handle.
        f.debug_struct("PooledConnection")
            .field("id", &self.meta.id)
            .field("checkouts", &self.meta.checkout_count)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            // Lost to a panicked worker; only the slot count remains.
            self.pool.total.fetch_sub(1, Ordering::SeqCst);
            warn!(conn_id = self.meta.id, "connection lost in worker");
            return;
        };
        if self.poisoned || self.pool.semaphore.is_closed() {
            self.meta.mark_closed();
        }
        if self.meta.state.should_remove() {
            self.pool.total.fetch_sub(1, Ordering::SeqCst);
            debug!(
                conn_id = self.meta.id,
                poisoned = self.poisoned,
                "discarding connection"
            );
            // Dropping the boxed connection closes the transport.
            return;
        }
        self.meta.mark_checkin();
        trace!(conn_id = self.meta.id, "returning connection to idle set");
        // The idle push happens before the permit (dropped after this body)
        // wakes a waiter, so a woken acquire always sees the connection.
        self.pool.idle.lock().push(IdleConnection {
            conn,
            meta: self.meta.clone(),
        });
    }
}
