//! Profiling requests and the builder that composes them.
//!
//! A request starts from the profiler service's default batch parameters and
//! adds two warehouse-specific overrides:
//!
//! - `use_quoted_name`, set when the stored table name is not already upper
//!   case. Unquoted identifiers fold to upper case, so such tables are only
//!   reachable through a quoted identifier.
//! - `custom_sql`, the fractional sampling query from
//!   [`plan_sampling`](crate::policy::plan_sampling), when one applies.
//!
//! # Example
//!
//! ```rust
//! use term_profiler::catalog::TableDescriptor;
//! use term_profiler::config::ProfilingConfig;
//! use term_profiler::dialect::SnowflakePolicy;
//! use term_profiler::request::RequestBuilder;
//! # use term_profiler::service::{ProfilerArgs, ProfilerService};
//! # use term_profiler::connection::WarehouseConnection;
//! # use term_profiler::request::ProfileRequest;
//! # use term_profiler::workunit::WorkUnit;
//! # struct Service;
//! # #[async_trait::async_trait]
//! # impl ProfilerService for Service {
//! #     async fn profile_table(&self, _: &mut dyn WarehouseConnection, _: &ProfileRequest, _: &ProfilerArgs)
//! #         -> term_profiler::error::Result<Option<WorkUnit>> { Ok(None) }
//! # }
//!
//! let config = ProfilingConfig::default().with_sample_size(10_000);
//! let policy = SnowflakePolicy::default();
//! let builder = RequestBuilder::new(&config, &policy, &Service);
//!
//! let table = TableDescriptor::new("t_lower").with_rows_count(1_000_000);
//! let request = builder.build(&table, "PUBLIC", "SALES").unwrap();
//!
//! assert!(request.batch_kwargs().use_quoted_name);
//! assert_eq!(
//!     request.batch_kwargs().custom_sql.as_deref(),
//!     Some("select * from \"SALES\".\"PUBLIC\".\"t_lower\" TABLESAMPLE (1.00000000)")
//! );
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::TableDescriptor;
use crate::config::ProfilingConfig;
use crate::dialect::WarehousePolicy;
use crate::error::{ErrorContext, Result, TermError};
use crate::policy::plan_sampling;
use crate::security::SqlSecurity;
use crate::service::ProfilerService;

/// Batch parameters for one profiling request, as an option-name → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchKwargs {
    pub schema: String,
    pub table: String,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Query profiled instead of the table, used for sampling
    pub custom_sql: Option<String>,
    /// Address the table with a quoted identifier
    pub use_quoted_name: bool,
    /// Service-specific options
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BatchKwargs {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// The parameters as a JSON object.
    pub fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self).context("failed to serialize batch parameters")? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(TermError::Internal(format!(
                "batch parameters serialized to a non-object: {other}"
            ))),
        }
    }
}

/// Immutable description of how to profile one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRequest {
    database: String,
    dataset_name: String,
    pretty_name: String,
    batch_kwargs: BatchKwargs,
}

impl ProfileRequest {
    /// Database the table lives in.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Normalized dataset identifier.
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Display name, `database.schema.table`.
    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    pub fn batch_kwargs(&self) -> &BatchKwargs {
        &self.batch_kwargs
    }
}

/// Builds [`ProfileRequest`]s for one profiling pass.
pub struct RequestBuilder<'a> {
    config: &'a ProfilingConfig,
    policy: &'a dyn WarehousePolicy,
    service: &'a dyn ProfilerService,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(
        config: &'a ProfilingConfig,
        policy: &'a dyn WarehousePolicy,
        service: &'a dyn ProfilerService,
    ) -> Self {
        Self {
            config,
            policy,
            service,
        }
    }

    /// Builds the request for one table.
    ///
    /// Fails with [`TermError::ConfigInconsistency`] when the table metadata
    /// cannot be addressed.
    pub fn build(
        &self,
        table: &TableDescriptor,
        schema: &str,
        database: &str,
    ) -> Result<ProfileRequest> {
        for (kind, name) in [("database", database), ("schema", schema), ("table", table.name.as_str())]
        {
            SqlSecurity::validate_identifier(name).map_err(|e| {
                TermError::config_inconsistency(
                    database,
                    schema,
                    format!("invalid {kind} name {name:?}: {e}"),
                )
            })?;
        }

        let sampling = plan_sampling(table, schema, database, self.config)
            .map_err(|e| TermError::config_inconsistency(database, schema, e.to_string()))?;

        let mut batch_kwargs = self
            .service
            .base_batch_kwargs(table, schema, database, self.config);
        batch_kwargs.use_quoted_name = self.policy.requires_quoted_name(&table.name);
        batch_kwargs.custom_sql = sampling.map(|plan| plan.to_sql());

        Ok(ProfileRequest {
            database: database.to_string(),
            dataset_name: self.policy.dataset_identifier(&table.name, schema, database),
            pretty_name: self.policy.pretty_name(&table.name, schema, database),
            batch_kwargs,
        })
    }
}
