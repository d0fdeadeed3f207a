//! Database-scoped connection provisioning.
//!
//! A provisioner hands out one [`DatabaseScopedFactory`] per database per
//! profiling pass. The factory is given to that pass's
//! [`ConnectionPool`](super::ConnectionPool), which is the only thing that
//! ever calls [`ConnectionFactory::connect`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ConnectionFactory, ScopedConnection, WarehouseDriver};
use crate::config::WarehouseConfig;
use crate::dialect::WarehousePolicy;
use crate::error::{Result, TermError};

/// Produces database-scoped connection factories.
#[derive(Clone)]
pub struct ConnectionProvisioner {
    driver: Arc<dyn WarehouseDriver>,
    config: Arc<WarehouseConfig>,
    policy: Arc<dyn WarehousePolicy>,
}

impl ConnectionProvisioner {
    pub fn new(
        driver: Arc<dyn WarehouseDriver>,
        config: WarehouseConfig,
        policy: Arc<dyn WarehousePolicy>,
    ) -> Self {
        Self {
            driver,
            config: Arc::new(config),
            policy,
        }
    }

    /// Builds the connection factory for `database`.
    ///
    /// No connection is opened here.
    pub fn factory_for(&self, database: &str) -> Result<DatabaseScopedFactory> {
        let use_database = self
            .policy
            .use_database_statement(database)
            .map_err(|e| TermError::connection(database, e.to_string()))?;

        debug!(
            url = %self.config.redacted_url(database),
            "Created connection factory"
        );

        Ok(DatabaseScopedFactory {
            driver: self.driver.clone(),
            config: self.config.clone(),
            database: database.to_string(),
            use_database,
        })
    }
}

impl std::fmt::Debug for ConnectionProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProvisioner")
            .field("account_id", &self.config.account_id)
            .field("platform", &self.policy.platform())
            .finish_non_exhaustive()
    }
}

/// Opens sessions and scopes them to a single database.
pub struct DatabaseScopedFactory {
    driver: Arc<dyn WarehouseDriver>,
    config: Arc<WarehouseConfig>,
    database: String,
    use_database: String,
}

impl DatabaseScopedFactory {
    /// The statement issued on every new session.
    pub fn use_database_statement(&self) -> &str {
        &self.use_database
    }
}

#[async_trait]
impl ConnectionFactory for DatabaseScopedFactory {
    fn database(&self) -> &str {
        &self.database
    }

    #[instrument(skip(self), fields(database = %self.database))]
    async fn connect(&self) -> Result<ScopedConnection> {
        let mut conn = self.driver.open(&self.config).await.map_err(|e| {
            TermError::connection_with_source(
                &self.database,
                "failed to open warehouse session",
                e,
            )
        })?;

        conn.execute(&self.use_database).await.map_err(|e| {
            TermError::connection_with_source(&self.database, "failed to select database", e)
        })?;

        debug!("Opened database-scoped warehouse session");
        Ok(ScopedConnection::new(conn, &self.database))
    }
}
