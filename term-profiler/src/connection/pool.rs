//! Bounded connection pool owned by a single profiling pass.
//!
//! Connections are created lazily through a [`ConnectionFactory`]. At most
//! `pool_size + max_overflow` connections exist at once; a semaphore enforces
//! the bound and workers wait for a permit when it is reached. Returned
//! connections go onto a LIFO idle stack capped at `pool_size`, and overflow
//! connections beyond that are closed on return.
//!
//! Dropping the last handle to a pool closes every idle connection. Leased
//! connections are closed or returned when their [`PooledConnection`] guard
//! drops, so abandoning a pass never leaks sessions.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

use super::ScopedConnection;
use crate::config::PoolOptions;
use crate::error::{Result, TermError};

/// Creates connections for a pool.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Database the created connections are scoped to.
    fn database(&self) -> &str;

    /// Opens a new connection.
    async fn connect(&self) -> Result<ScopedConnection>;
}

struct PoolInner {
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<Vec<ScopedConnection>>,
    permits: Arc<Semaphore>,
    pool_size: usize,
    capacity: usize,
    acquire_timeout: Duration,
    created: AtomicUsize,
    closed: AtomicUsize,
}

impl PoolInner {
    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<ScopedConnection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, conn: ScopedConnection) {
        let mut idle = self.idle();
        if idle.len() < self.pool_size && !self.permits.is_closed() {
            idle.push(conn);
        } else {
            drop(idle);
            drop(conn);
            self.closed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum simultaneous connections
    pub capacity: usize,
    /// Connections currently leased
    pub in_use: usize,
    /// Connections waiting on the idle stack
    pub idle: usize,
    /// Connections opened so far
    pub created: usize,
    /// Connections closed so far
    pub closed: usize,
}

/// Lazily filled, bounded connection pool for one database.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a pool sized for `max_workers` concurrent jobs.
    ///
    /// The overflow is raised to at least `max_workers`, see
    /// [`PoolOptions::effective_max_overflow`].
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        options: &PoolOptions,
        max_workers: usize,
    ) -> Self {
        let pool_size = options.pool_size.max(1);
        let capacity = pool_size + options.effective_max_overflow(max_workers);

        Self {
            inner: Arc::new(PoolInner {
                factory,
                idle: Mutex::new(Vec::with_capacity(pool_size)),
                permits: Arc::new(Semaphore::new(capacity)),
                pool_size,
                capacity,
                acquire_timeout: options.acquire_timeout,
                created: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }

    /// Database this pool's connections are scoped to.
    pub fn database(&self) -> &str {
        self.inner.factory.database()
    }

    /// Leases a connection, reusing an idle one or opening a new one.
    #[instrument(skip(self), fields(database = %self.database()))]
    pub async fn get(&self) -> Result<PooledConnection> {
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            TermError::connection(
                self.database(),
                format!(
                    "timed out after {:?} waiting for a pooled connection",
                    self.inner.acquire_timeout
                ),
            )
        })?
        .map_err(|_| TermError::connection(self.database(), "connection pool is closed"))?;

        let reused = self.inner.idle().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => {
                let conn = self.inner.factory.connect().await?;
                let created = self.inner.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(created, capacity = self.inner.capacity, "Opened pooled connection");
                conn
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            _permit: permit,
            pool: self.inner.clone(),
        })
    }

    /// Closes the pool: idle connections are dropped, waiting workers fail,
    /// and connections still leased are closed when returned.
    pub fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<_> = self.inner.idle().drain(..).collect();
        self.inner
            .closed
            .fetch_add(drained.len(), Ordering::Relaxed);
    }

    /// Current pool counters.
    pub fn status(&self) -> PoolStatus {
        let idle = self.inner.idle().len();
        let in_use = if self.inner.permits.is_closed() {
            0
        } else {
            self.inner.capacity - self.inner.permits.available_permits()
        };
        PoolStatus {
            capacity: self.inner.capacity,
            in_use,
            idle,
            created: self.inner.created.load(Ordering::Relaxed),
            closed: self.inner.closed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("database", &self.database())
            .field("status", &self.status())
            .finish()
    }
}

/// A leased connection. Returned to the pool on drop.
pub struct PooledConnection {
    conn: Option<ScopedConnection>,
    _permit: OwnedSemaphorePermit,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Closes the connection instead of returning it, e.g. after a failure
    /// that may have left the session in an unknown state.
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            self.pool.closed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("database", &self.pool.factory.database())
            .field("released", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = ScopedConnection;

    // Only `discard` and `drop` take the connection, and both consume the guard.
    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("pooled connection already released")
    }
}

impl DerefMut for PooledConnection {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("pooled connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
