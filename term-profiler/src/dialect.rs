//! Warehouse dialect policy: identifier normalization, quoting and type mapping.
//!
//! The profiling orchestrator is warehouse agnostic; everything that depends
//! on the target dialect lives behind [`WarehousePolicy`]. [`SnowflakePolicy`]
//! is the implementation for Snowflake, whose unquoted identifiers fold to
//! upper case.
//!
//! Column types the profiler cannot compute statistics for (spatial types)
//! are mapped to a null type in a process-wide [`TypeRegistry`]. Registration
//! is explicit and idempotent: [`register_null_types`] is called when a
//! policy is constructed and returns the same registry on every call.

use std::collections::HashSet;

use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::security::SqlSecurity;

/// Column types mapped to the null type for Snowflake.
pub const SNOWFLAKE_NULL_TYPES: &[&str] = &["GEOGRAPHY", "GEOMETRY"];

static TYPE_REGISTRY: OnceCell<TypeRegistry> = OnceCell::new();

/// Registry of column types that are treated as untyped (null) by profiling.
#[derive(Debug)]
pub struct TypeRegistry {
    null_types: HashSet<String>,
}

impl TypeRegistry {
    fn with_null_types(types: &[&str]) -> Self {
        Self {
            null_types: types.iter().map(|t| t.to_ascii_uppercase()).collect(),
        }
    }

    /// Returns true if the raw column type maps to the null type.
    ///
    /// Type parameters are ignored, so `GEOGRAPHY(POINT)` matches `GEOGRAPHY`.
    pub fn is_null_mapped(&self, raw_type: &str) -> bool {
        self.null_types.contains(&base_type(raw_type))
    }

    /// Registered null types in sorted order.
    pub fn null_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.null_types.iter().cloned().collect();
        types.sort_unstable();
        types
    }

    /// Number of registered null types.
    pub fn len(&self) -> usize {
        self.null_types.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.null_types.is_empty()
    }
}

/// Upper-cased base name of a raw column type, without type parameters.
pub fn base_type(raw_type: &str) -> String {
    raw_type
        .split('(')
        .next()
        .unwrap_or(raw_type)
        .trim()
        .to_ascii_uppercase()
}

/// Registers the Snowflake null-mapped types. Safe to call any number of times.
pub fn register_null_types() -> &'static TypeRegistry {
    TYPE_REGISTRY.get_or_init(|| {
        tracing::debug!(types = ?SNOWFLAKE_NULL_TYPES, "Registering null-mapped column types");
        TypeRegistry::with_null_types(SNOWFLAKE_NULL_TYPES)
    })
}

/// Dialect-specific identifier and connection policy.
pub trait WarehousePolicy: Send + Sync {
    /// Platform name reported alongside profiling results.
    fn platform(&self) -> &str;

    /// Normalized dataset identifier for a table.
    fn dataset_identifier(&self, table: &str, schema: &str, database: &str) -> String;

    /// Human-readable `database.schema.table` name.
    fn pretty_name(&self, table: &str, schema: &str, database: &str) -> String {
        format!("{database}.{schema}.{table}")
    }

    /// Whether the table must be addressed with a quoted identifier.
    fn requires_quoted_name(&self, table: &str) -> bool;

    /// Statement that scopes a session to `database`.
    fn use_database_statement(&self, database: &str) -> Result<String>;

    /// Column types mapped to the null type, handed to the profiler service
    /// through [`ProfilerArgs`](crate::service::ProfilerArgs).
    fn null_mapped_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether a column of this raw type can be profiled.
    fn is_profilable_type(&self, raw_type: &str) -> bool {
        let base = base_type(raw_type);
        !self.null_mapped_types().contains(&base)
    }
}

/// [`WarehousePolicy`] for Snowflake.
#[derive(Debug, Clone)]
pub struct SnowflakePolicy {
    convert_urns_to_lowercase: bool,
    types: &'static TypeRegistry,
}

impl Default for SnowflakePolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SnowflakePolicy {
    /// Creates the policy and makes sure the dialect's type registry exists.
    pub fn new(convert_urns_to_lowercase: bool) -> Self {
        Self {
            convert_urns_to_lowercase,
            types: register_null_types(),
        }
    }
}

impl WarehousePolicy for SnowflakePolicy {
    fn platform(&self) -> &str {
        "snowflake"
    }

    fn dataset_identifier(&self, table: &str, schema: &str, database: &str) -> String {
        let identifier = format!("{database}.{schema}.{table}");
        if self.convert_urns_to_lowercase {
            identifier.to_lowercase()
        } else {
            identifier
        }
    }

    fn requires_quoted_name(&self, table: &str) -> bool {
        // Unquoted identifiers fold to upper case.
        table != table.to_uppercase()
    }

    fn use_database_statement(&self, database: &str) -> Result<String> {
        Ok(format!(
            "use database {}",
            SqlSecurity::quote_identifier(database)?
        ))
    }

    fn null_mapped_types(&self) -> Vec<String> {
        self.types.null_types()
    }

    fn is_profilable_type(&self, raw_type: &str) -> bool {
        !self.types.is_null_mapped(raw_type)
    }
}
