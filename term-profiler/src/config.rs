//! Configuration for profiling passes and warehouse connections.
//!
//! Parsing configuration files is left to the embedding application; these
//! types only derive [`serde::Deserialize`] so they can be loaded from whatever
//! format the caller uses. Every struct has sensible defaults and `with_*`
//! setters for programmatic construction.
//!
//! # Example
//!
//! ```rust
//! use term_profiler::config::{ProfilerSettings, ProfilingConfig, WarehouseConfig};
//!
//! let settings = ProfilerSettings::new(
//!     WarehouseConfig::new("acme-xy12345", "profiler_svc", "secret").with_role("ANALYST"),
//! )
//! .with_profiling(
//!     ProfilingConfig::default()
//!         .with_enabled(true)
//!         .with_sample_size(10_000)
//!         .with_max_workers(8),
//! );
//!
//! assert!(settings.validate().is_ok());
//! assert_eq!(settings.warehouse.pool.effective_max_overflow(8), 8);
//! ```

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, TermError};
use crate::security::{SecureString, SqlSecurity};

/// Bytes per gigabyte, used by `profile_table_size_limit`.
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Allow/deny regex patterns matched against `database.schema.table`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AllowDenyPattern {
    /// Patterns a name must match at least one of
    pub allow: Vec<String>,
    /// Patterns that exclude a name even if allowed
    pub deny: Vec<String>,
    /// Whether matching ignores case
    pub ignore_case: bool,
}

impl Default for AllowDenyPattern {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl AllowDenyPattern {
    /// A pattern that allows every name.
    pub fn allow_all() -> Self {
        Self {
            allow: vec![".*".to_string()],
            deny: Vec::new(),
            ignore_case: true,
        }
    }

    /// Adds a deny pattern.
    pub fn with_deny(mut self, pattern: impl Into<String>) -> Self {
        self.deny.push(pattern.into());
        self
    }

    /// Replaces the allow list with a single pattern.
    pub fn with_allow(mut self, pattern: impl Into<String>) -> Self {
        self.allow = vec![pattern.into()];
        self
    }

    /// Compiles the patterns. Patterns are anchored at the start of the name.
    pub fn compile(&self) -> Result<CompiledPattern> {
        let compile_all = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| {
                    let anchored = if self.ignore_case {
                        format!("(?i)^(?:{p})")
                    } else {
                        format!("^(?:{p})")
                    };
                    SqlSecurity::validate_regex_pattern(&anchored)
                })
                .collect()
        };

        Ok(CompiledPattern {
            allow: compile_all(&self.allow)?,
            deny: compile_all(&self.deny)?,
        })
    }
}

/// Compiled form of [`AllowDenyPattern`].
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl CompiledPattern {
    /// Returns true if the name is allowed and not denied.
    pub fn allowed(&self, name: &str) -> bool {
        if self.deny.iter().any(|re| re.is_match(name)) {
            return false;
        }
        self.allow.iter().any(|re| re.is_match(name))
    }
}

/// Profiling behaviour for one pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Master switch for profiling
    pub enabled: bool,
    /// Whether external tables are profiled
    pub profile_external_tables: bool,
    /// Whether large tables are sampled
    pub use_sampling: bool,
    /// Target number of sampled rows
    pub sample_size: u64,
    /// Fixed result-row limit; disables sampling when set
    pub limit: Option<u64>,
    /// Row offset passed to the profiler service
    pub offset: Option<u64>,
    /// Number of concurrent profiling jobs
    pub max_workers: usize,
    /// Isolate per-table failures instead of failing the pass
    pub catch_exceptions: bool,
    /// Tables eligible for profiling, matched on `database.schema.table`
    pub profile_pattern: AllowDenyPattern,
    /// Skip tables larger than this many gigabytes
    pub profile_table_size_limit: Option<u64>,
    /// Skip tables with more rows than this
    pub profile_table_row_limit: Option<u64>,
    /// Only profile tables altered within this many days
    pub profile_if_updated_since_days: Option<f64>,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            profile_external_tables: false,
            use_sampling: true,
            sample_size: 10_000,
            limit: None,
            offset: None,
            max_workers: 5 * num_cpus::get(),
            catch_exceptions: true,
            profile_pattern: AllowDenyPattern::allow_all(),
            profile_table_size_limit: Some(5),
            profile_table_row_limit: Some(5_000_000),
            profile_if_updated_since_days: None,
        }
    }
}

impl ProfilingConfig {
    /// Enables or disables profiling.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Allows or disallows profiling of external tables.
    pub fn with_profile_external_tables(mut self, allowed: bool) -> Self {
        self.profile_external_tables = allowed;
        self
    }

    /// Enables or disables sampling of large tables.
    pub fn with_use_sampling(mut self, use_sampling: bool) -> Self {
        self.use_sampling = use_sampling;
        self
    }

    /// Sets the target sample size in rows.
    pub fn with_sample_size(mut self, sample_size: u64) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Sets a fixed result-row limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the row offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the worker-pool size.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets whether per-table failures are isolated.
    pub fn with_catch_exceptions(mut self, catch: bool) -> Self {
        self.catch_exceptions = catch;
        self
    }

    /// Sets the table allow/deny pattern.
    pub fn with_profile_pattern(mut self, pattern: AllowDenyPattern) -> Self {
        self.profile_pattern = pattern;
        self
    }

    /// Sets the table size limit in gigabytes, `None` disables it.
    pub fn with_table_size_limit(mut self, gigabytes: Option<u64>) -> Self {
        self.profile_table_size_limit = gigabytes;
        self
    }

    /// Sets the table row limit, `None` disables it.
    pub fn with_table_row_limit(mut self, rows: Option<u64>) -> Self {
        self.profile_table_row_limit = rows;
        self
    }

    /// Only profile tables altered within the given number of days.
    pub fn with_updated_since_days(mut self, days: f64) -> Self {
        self.profile_if_updated_since_days = Some(days);
        self
    }

    /// The fixed limit, if one is in effect. A zero limit counts as unset.
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(TermError::Configuration(
                "profiling.max_workers must be at least 1".to_string(),
            ));
        }
        if self.use_sampling && self.sample_size == 0 {
            return Err(TermError::Configuration(
                "profiling.sample_size must be positive when sampling is enabled".to_string(),
            ));
        }
        if let Some(days) = self.profile_if_updated_since_days {
            if !days.is_finite() || days < 0.0 {
                return Err(TermError::Configuration(format!(
                    "profiling.profile_if_updated_since_days must be a non-negative number, got {days}"
                )));
            }
        }
        self.profile_pattern.compile()?;
        Ok(())
    }
}

/// Connection pool sizing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolOptions {
    /// Connections kept idle between leases
    pub pool_size: usize,
    /// Extra connections allowed beyond `pool_size`
    pub max_overflow: Option<usize>,
    /// How long a worker waits for a free connection
    #[serde(with = "duration_secs")]
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            pool_size: 5,
            max_overflow: None,
            acquire_timeout: Duration::from_secs(300),
        }
    }
}

impl PoolOptions {
    /// Overflow actually used for a pass with `max_workers` concurrent jobs.
    ///
    /// Never below `max_workers`, so the pool cannot throttle the worker pool.
    pub fn effective_max_overflow(&self, max_workers: usize) -> usize {
        self.max_overflow.unwrap_or(0).max(max_workers)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Warehouse connection parameters, passed opaquely to the driver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Account identifier, e.g. `acme-xy12345`
    pub account_id: String,
    /// Explicit host; derived from the account when unset
    pub host: Option<String>,
    /// Login user
    pub username: String,
    /// Login password
    pub password: Option<SecureString>,
    /// Role assumed by the session
    pub role: Option<String>,
    /// Virtual warehouse used for queries
    pub warehouse: Option<String>,
    /// Pool sizing
    pub pool: PoolOptions,
}

impl WarehouseConfig {
    /// Creates a configuration with the required login parameters.
    pub fn new(
        account_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            username: username.into(),
            password: Some(SecureString::new(password.into())),
            ..Default::default()
        }
    }

    /// Sets the role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the virtual warehouse.
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Sets an explicit host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets pool options.
    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }

    /// Host to connect to.
    pub fn host(&self) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| format!("{}.snowflakecomputing.com", self.account_id))
    }

    /// Connection URL for `database` with the password redacted, for logging.
    pub fn redacted_url(&self, database: &str) -> String {
        let mut url = format!(
            "snowflake://{}:***@{}/{}",
            self.username, self.account_id, database
        );
        let mut params = Vec::new();
        if let Some(role) = &self.role {
            params.push(format!("role={role}"));
        }
        if let Some(warehouse) = &self.warehouse {
            params.push(format!("warehouse={warehouse}"));
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(TermError::Configuration(
                "warehouse.account_id is required".to_string(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(TermError::Configuration(
                "warehouse.username is required".to_string(),
            ));
        }
        if self.pool.pool_size == 0 {
            return Err(TermError::Configuration(
                "warehouse.pool.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level settings for the profiler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfilerSettings {
    /// Profiling behaviour
    pub profiling: ProfilingConfig,
    /// Warehouse connection parameters
    pub warehouse: WarehouseConfig,
    /// Lower-case dataset identifiers
    pub convert_urns_to_lowercase: bool,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            profiling: ProfilingConfig::default(),
            warehouse: WarehouseConfig::default(),
            convert_urns_to_lowercase: true,
        }
    }
}

impl ProfilerSettings {
    /// Creates settings for the given warehouse.
    pub fn new(warehouse: WarehouseConfig) -> Self {
        Self {
            warehouse,
            ..Default::default()
        }
    }

    /// Sets the profiling configuration.
    pub fn with_profiling(mut self, profiling: ProfilingConfig) -> Self {
        self.profiling = profiling;
        self
    }

    /// Sets identifier lower-casing.
    pub fn with_convert_urns_to_lowercase(mut self, enabled: bool) -> Self {
        self.convert_urns_to_lowercase = enabled;
        self
    }

    /// Returns true if profiling is switched on.
    pub fn is_profiling_enabled(&self) -> bool {
        self.profiling.enabled
    }

    /// Validates both sections.
    pub fn validate(&self) -> Result<()> {
        self.profiling.validate()?;
        self.warehouse.validate()
    }
}
