//! Warehouse connectivity.
//!
//! The warehouse driver itself is an external collaborator behind
//! [`WarehouseDriver`]. This module adds database scoping on top of it
//! ([`provisioner`]) and a per-pass connection pool ([`pool`]).

use async_trait::async_trait;

use crate::config::WarehouseConfig;
use crate::error::BoxError;

pub mod pool;
pub mod provisioner;

pub use pool::{ConnectionFactory, ConnectionPool, PoolStatus, PooledConnection};
pub use provisioner::{ConnectionProvisioner, DatabaseScopedFactory};

/// A live warehouse session.
#[async_trait]
pub trait WarehouseConnection: Send {
    /// Executes a statement, discarding any result set.
    async fn execute(&mut self, statement: &str) -> Result<(), BoxError>;
}

/// Opens raw warehouse sessions from stored credentials.
#[async_trait]
pub trait WarehouseDriver: Send + Sync {
    /// Authenticates and opens a new session.
    async fn open(&self, config: &WarehouseConfig) -> Result<Box<dyn WarehouseConnection>, BoxError>;
}

/// A session that has been scoped to one database with `use database`.
pub struct ScopedConnection {
    inner: Box<dyn WarehouseConnection>,
    database: String,
}

impl ScopedConnection {
    pub(crate) fn new(inner: Box<dyn WarehouseConnection>, database: impl Into<String>) -> Self {
        Self {
            inner,
            database: database.into(),
        }
    }

    /// Database every statement on this session runs against.
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl std::fmt::Debug for ScopedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedConnection")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WarehouseConnection for ScopedConnection {
    async fn execute(&mut self, statement: &str) -> Result<(), BoxError> {
        self.inner.execute(statement).await
    }
}
