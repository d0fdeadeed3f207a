//! Table eligibility for profiling.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TableDescriptor;
use crate::config::{CompiledPattern, ProfilingConfig, BYTES_PER_GB};
use crate::error::Result;

/// Why a table was not profiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// External table while `profile_external_tables` is off
    ExternalTableExcluded,
    /// Rejected by `profile_pattern`
    DeniedByPattern,
    /// Not altered within `profile_if_updated_since_days`
    NotUpdatedRecently,
    /// Larger than `profile_table_size_limit`
    SizeLimitExceeded,
    /// More rows than `profile_table_row_limit`
    RowLimitExceeded,
    /// Already profiled according to persisted state
    AlreadyProfiled,
}

impl SkipReason {
    /// Name of the per-schema report counter this reason increments.
    pub fn counter_name(&self) -> &'static str {
        match self {
            SkipReason::ExternalTableExcluded => "profiling_skipped_other",
            SkipReason::DeniedByPattern => "profiling_skipped_denied",
            SkipReason::NotUpdatedRecently => "profiling_skipped_not_updated",
            SkipReason::SizeLimitExceeded => "profiling_skipped_size_limit",
            SkipReason::RowLimitExceeded => "profiling_skipped_row_limit",
            SkipReason::AlreadyProfiled => "profiling_skipped_already_profiled",
        }
    }

    /// Returns true if the skip is counted as "skipped-other".
    pub fn is_other(&self) -> bool {
        matches!(self, SkipReason::ExternalTableExcluded)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::ExternalTableExcluded => "external table excluded",
            SkipReason::DeniedByPattern => "denied by profile pattern",
            SkipReason::NotUpdatedRecently => "not updated recently",
            SkipReason::SizeLimitExceeded => "size limit exceeded",
            SkipReason::RowLimitExceeded => "row limit exceeded",
            SkipReason::AlreadyProfiled => "already profiled",
        };
        f.write_str(text)
    }
}

/// Outcome of the eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Profile,
    Skip(SkipReason),
}

impl Decision {
    pub fn is_profile(&self) -> bool {
        matches!(self, Decision::Profile)
    }
}

/// Decides which tables are profiled.
///
/// Rules are applied in a fixed order and the first one that rejects a table
/// wins, so each table gets exactly one reason.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    profile_external_tables: bool,
    pattern: CompiledPattern,
    size_limit_bytes: Option<u64>,
    row_limit: Option<u64>,
    updated_since_days: Option<f64>,
}

impl EligibilityFilter {
    /// Builds a filter from the profiling configuration.
    pub fn new(config: &ProfilingConfig) -> Result<Self> {
        Ok(Self {
            profile_external_tables: config.profile_external_tables,
            pattern: config.profile_pattern.compile()?,
            size_limit_bytes: config
                .profile_table_size_limit
                .map(|gb| gb.saturating_mul(BYTES_PER_GB)),
            row_limit: config.profile_table_row_limit,
            updated_since_days: config.profile_if_updated_since_days,
        })
    }

    /// Classifies one table.
    pub fn decide(
        &self,
        table: &TableDescriptor,
        schema: &str,
        database: &str,
        now: DateTime<Utc>,
    ) -> Decision {
        if table.kind.is_external() && !self.profile_external_tables {
            return Decision::Skip(SkipReason::ExternalTableExcluded);
        }

        let full_name = format!("{database}.{schema}.{}", table.name);
        if !self.pattern.allowed(&full_name) {
            return Decision::Skip(SkipReason::DeniedByPattern);
        }

        if let (Some(days), Some(last_altered)) = (self.updated_since_days, table.last_altered) {
            let window = chrono::Duration::milliseconds((days * 86_400_000.0) as i64);
            if now.signed_duration_since(last_altered) > window {
                return Decision::Skip(SkipReason::NotUpdatedRecently);
            }
        }

        if let (Some(limit), Some(size)) = (self.size_limit_bytes, table.size_in_bytes) {
            if size > limit {
                return Decision::Skip(SkipReason::SizeLimitExceeded);
            }
        }

        if let (Some(limit), Some(rows)) = (self.row_limit, table.rows_count) {
            if rows > limit {
                return Decision::Skip(SkipReason::RowLimitExceeded);
            }
        }

        Decision::Profile
    }
}
