//! Contract with the external profiler service.
//!
//! The service owns the statistics engine: it turns a [`ProfileRequest`] into
//! queries on a database-scoped connection and produces a [`WorkUnit`]. The
//! orchestrator only decides what to ask for and schedules the calls.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Serialize;

use crate::catalog::TableDescriptor;
use crate::config::ProfilingConfig;
use crate::connection::WarehouseConnection;
use crate::dialect::base_type;
use crate::error::Result;
use crate::request::{BatchKwargs, ProfileRequest};
use crate::workunit::WorkUnit;

/// Arguments shared by every job of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilerArgs {
    /// Database the batch runs against
    pub database: String,
    /// Platform name, e.g. `snowflake`
    pub platform: String,
    /// Isolate per-table failures instead of failing the pass
    pub catch_exceptions: bool,
    /// Column types the dialect maps to the null type; not profiled
    pub null_mapped_types: BTreeSet<String>,
    /// Service-specific options
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProfilerArgs {
    pub fn new(database: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            platform: platform.into(),
            catch_exceptions: true,
            null_mapped_types: BTreeSet::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_null_mapped_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.null_mapped_types = types.into_iter().map(|t| base_type(&t)).collect();
        self
    }

    /// Whether a column of this raw type should be profiled.
    pub fn is_profilable_type(&self, raw_type: &str) -> bool {
        !self.null_mapped_types.contains(&base_type(raw_type))
    }

    pub fn with_catch_exceptions(mut self, catch: bool) -> Self {
        self.catch_exceptions = catch;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// The statistics engine that profiles one table per call.
#[async_trait]
pub trait ProfilerService: Send + Sync {
    /// Default batch parameters for a table.
    ///
    /// The default fills in the target table and the configured limit/offset;
    /// warehouse-specific overrides are layered on top by the request builder.
    fn base_batch_kwargs(
        &self,
        table: &TableDescriptor,
        schema: &str,
        _database: &str,
        config: &ProfilingConfig,
    ) -> BatchKwargs {
        let mut kwargs = BatchKwargs::new(schema, &table.name);
        kwargs.limit = config.effective_limit();
        kwargs.offset = config.offset;
        kwargs
    }

    /// Profiles one table on a connection already scoped to its database.
    ///
    /// Returning `Ok(None)` means the service chose not to emit a result.
    async fn profile_table(
        &self,
        conn: &mut dyn WarehouseConnection,
        request: &ProfileRequest,
        args: &ProfilerArgs,
    ) -> Result<Option<WorkUnit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{SnowflakePolicy, WarehousePolicy};

    struct DefaultsOnly;

    #[async_trait]
    impl ProfilerService for DefaultsOnly {
        async fn profile_table(
            &self,
            _conn: &mut dyn WarehouseConnection,
            _request: &ProfileRequest,
            _args: &ProfilerArgs,
        ) -> Result<Option<WorkUnit>> {
            Ok(None)
        }
    }

    #[test]
    fn test_default_base_batch_kwargs() {
        let config = ProfilingConfig::default().with_limit(100).with_offset(10);
        let kwargs = DefaultsOnly.base_batch_kwargs(
            &TableDescriptor::new("ORDERS"),
            "PUBLIC",
            "SALES",
            &config,
        );

        assert_eq!(kwargs.schema, "PUBLIC");
        assert_eq!(kwargs.table, "ORDERS");
        assert_eq!(kwargs.limit, Some(100));
        assert_eq!(kwargs.offset, Some(10));
        assert_eq!(kwargs.custom_sql, None);
        assert!(!kwargs.use_quoted_name);
    }

    #[test]
    fn test_profiler_args_builder() {
        let args = ProfilerArgs::new("SALES", "snowflake")
            .with_catch_exceptions(false)
            .with_extra("turn_off_expensive_profiling_metrics", serde_json::json!(true));

        assert!(!args.catch_exceptions);
        assert_eq!(args.extra.len(), 1);
    }

    #[test]
    fn test_profiler_args_type_check_follows_dialect() {
        let policy = SnowflakePolicy::default();
        let args = ProfilerArgs::new("SALES", policy.platform())
            .with_null_mapped_types(policy.null_mapped_types());

        for raw in ["GEOGRAPHY", "geometry", "GEOGRAPHY(POINT)", "NUMBER(38,0)", "VARCHAR"] {
            assert_eq!(args.is_profilable_type(raw), policy.is_profilable_type(raw), "{raw}");
        }
        assert!(ProfilerArgs::new("SALES", "snowflake").is_profilable_type("GEOGRAPHY"));
    }
}
