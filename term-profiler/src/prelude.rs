//! Prelude for commonly used types and traits in term-profiler.

pub use crate::catalog::{CatalogSnapshot, TableDescriptor, TableKind};
pub use crate::config::{
    AllowDenyPattern, PoolOptions, ProfilerSettings, ProfilingConfig, WarehouseConfig,
};
pub use crate::connection::{WarehouseConnection, WarehouseDriver};
pub use crate::dialect::{SnowflakePolicy, WarehousePolicy};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::orchestrator::WarehouseProfiler;
pub use crate::policy::SkipReason;
pub use crate::report::{ProfilingReport, ProfilingReporter};
pub use crate::request::{BatchKwargs, ProfileRequest};
pub use crate::security::SecureString;
pub use crate::service::{ProfilerArgs, ProfilerService};
pub use crate::state::{InMemoryStateHandler, ProfilingStateHandler};
pub use crate::workunit::{WorkUnit, WorkUnitStream};
