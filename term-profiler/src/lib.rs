//! # Term Profiler - Table Profiling for Cloud Warehouses
//!
//! Term Profiler decides which tables of a Snowflake database should be
//! statistically profiled, describes how each one is profiled, and drives the
//! profiling itself over a bounded pool of database-scoped connections.
//! Results come back as a lazy stream of work units.
//!
//! The statistics engine, catalog discovery, and the warehouse driver are
//! supplied by the application through traits:
//!
//! - [`service::ProfilerService`] turns a request into a [`workunit::WorkUnit`]
//! - [`connection::WarehouseDriver`] opens warehouse sessions
//! - [`report::ProfilingReporter`] receives skip and failure accounting
//! - [`state::ProfilingStateHandler`] optionally remembers past runs
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use term_profiler::error::BoxError;
//! use term_profiler::prelude::*;
//!
//! struct Driver;
//! struct Session;
//!
//! #[async_trait]
//! impl WarehouseConnection for Session {
//!     async fn execute(&mut self, _statement: &str) -> std::result::Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl WarehouseDriver for Driver {
//!     async fn open(
//!         &self,
//!         _config: &WarehouseConfig,
//!     ) -> std::result::Result<Box<dyn WarehouseConnection>, BoxError> {
//!         Ok(Box::new(Session))
//!     }
//! }
//!
//! struct RowCounter;
//!
//! #[async_trait]
//! impl ProfilerService for RowCounter {
//!     async fn profile_table(
//!         &self,
//!         _conn: &mut dyn WarehouseConnection,
//!         request: &ProfileRequest,
//!         _args: &ProfilerArgs,
//!     ) -> Result<Option<WorkUnit>> {
//!         Ok(Some(WorkUnit::new(
//!             format!("{}-profile", request.dataset_name()),
//!             request.dataset_name(),
//!             serde_json::json!({ "rows": 42 }),
//!         )))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let settings = ProfilerSettings::new(WarehouseConfig::new("acme", "profiler", "secret"))
//!     .with_profiling(ProfilingConfig::default().with_enabled(true));
//!
//! let report = Arc::new(ProfilingReport::new());
//! let profiler = WarehouseProfiler::builder(settings)
//!     .driver(Arc::new(Driver))
//!     .service(Arc::new(RowCounter))
//!     .reporter(report.clone())
//!     .build()?;
//!
//! let catalog = CatalogSnapshot::new("SALES").with_schema(
//!     "PUBLIC",
//!     [
//!         TableDescriptor::new("ORDERS").with_rows_count(1_000_000),
//!         TableDescriptor::external("CLICKSTREAM"),
//!     ],
//! );
//!
//! let units = profiler.get_workunits(&catalog)?.try_collect_units().await?;
//!
//! assert_eq!(units.len(), 1);
//! assert_eq!(report.profiling_skipped_other("PUBLIC"), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`policy`**: table eligibility and fractional sampling, both pure
//! - **`request`**: composes the per-table profiling request
//! - **`connection`**: database-scoped session factories and the per-pass pool
//! - **`executor`**: bounded-concurrency fan-out of requests
//! - **`orchestrator`**: the Collect → Dispatch → Emit pass
//! - **`dialect`**: Snowflake identifier rules and null-mapped column types
//! - **`config`**, **`security`**, **`error`**, **`logging`**: ambient support

pub mod catalog;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod policy;
pub mod prelude;
pub mod report;
pub mod request;
pub mod security;
pub mod service;
pub mod state;
pub mod workunit;

#[cfg(test)]
pub(crate) mod test_fixtures;
