//! Reporting of profiling outcomes.
//!
//! The orchestrator tells a [`ProfilingReporter`] about every table it decides
//! on and every isolated failure. [`ProfilingReport`] is the in-memory
//! implementation, keeping per-schema counters keyed by
//! [`SkipReason::counter_name`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::policy::SkipReason;

/// Sink for profiling outcomes.
pub trait ProfilingReporter: Send + Sync {
    /// A request was built for the table.
    fn report_entity_profiled(&self, schema: &str, pretty_name: &str);

    /// The table was not profiled.
    fn report_skipped(&self, schema: &str, table: &str, reason: SkipReason);

    /// Profiling the table failed and the failure was isolated.
    fn report_failure(&self, pretty_name: &str, message: &str);
}

/// A failure recorded by [`ProfilingReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfilingFailure {
    pub table: String,
    pub message: String,
}

/// Serializable copy of a [`ProfilingReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSnapshot {
    /// Profiled table count per schema
    pub profiled: BTreeMap<String, u64>,
    /// Skip counters per counter name, then per schema
    pub skipped: BTreeMap<&'static str, BTreeMap<String, u64>>,
    /// Display names of profiled tables, in report order
    pub profiled_entities: Vec<String>,
    pub failures: Vec<ProfilingFailure>,
}

#[derive(Debug, Default)]
struct ReportState {
    profiled: HashMap<String, u64>,
    skipped: HashMap<&'static str, HashMap<String, u64>>,
    profiled_entities: Vec<String>,
    failures: Vec<ProfilingFailure>,
}

/// In-memory [`ProfilingReporter`].
///
/// ```rust
/// use term_profiler::policy::SkipReason;
/// use term_profiler::report::{ProfilingReport, ProfilingReporter};
///
/// let report = ProfilingReport::new();
/// report.report_skipped("PUBLIC", "EXT", SkipReason::ExternalTableExcluded);
/// report.report_entity_profiled("PUBLIC", "SALES.PUBLIC.ORDERS");
///
/// assert_eq!(report.profiling_skipped_other("PUBLIC"), 1);
/// assert_eq!(report.entities_profiled(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ProfilingReport {
    state: Mutex<ReportState>,
}

impl ProfilingReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tables skipped as "other" in a schema, i.e. excluded external tables.
    pub fn profiling_skipped_other(&self, schema: &str) -> u64 {
        self.skipped(SkipReason::ExternalTableExcluded, schema)
    }

    /// Tables skipped for `reason` in a schema.
    pub fn skipped(&self, reason: SkipReason, schema: &str) -> u64 {
        self.state()
            .skipped
            .get(reason.counter_name())
            .and_then(|by_schema| by_schema.get(schema))
            .copied()
            .unwrap_or(0)
    }

    /// Tables skipped for any reason across all schemas.
    pub fn total_skipped(&self) -> u64 {
        self.state()
            .skipped
            .values()
            .flat_map(|by_schema| by_schema.values())
            .sum()
    }

    /// Tables profiled in a schema.
    pub fn profiled_in(&self, schema: &str) -> u64 {
        self.state().profiled.get(schema).copied().unwrap_or(0)
    }

    /// Tables profiled across all schemas.
    pub fn entities_profiled(&self) -> usize {
        self.state().profiled_entities.len()
    }

    pub fn profiled_entities(&self) -> Vec<String> {
        self.state().profiled_entities.clone()
    }

    pub fn failures(&self) -> Vec<ProfilingFailure> {
        self.state().failures.clone()
    }

    pub fn snapshot(&self) -> ReportSnapshot {
        let state = self.state();
        ReportSnapshot {
            profiled: state
                .profiled
                .iter()
                .map(|(schema, count)| (schema.clone(), *count))
                .collect(),
            skipped: state
                .skipped
                .iter()
                .map(|(counter, by_schema)| {
                    let by_schema = by_schema
                        .iter()
                        .map(|(schema, count)| (schema.clone(), *count))
                        .collect();
                    (*counter, by_schema)
                })
                .collect(),
            profiled_entities: state.profiled_entities.clone(),
            failures: state.failures.clone(),
        }
    }
}

impl ProfilingReporter for ProfilingReport {
    fn report_entity_profiled(&self, schema: &str, pretty_name: &str) {
        let mut state = self.state();
        *state.profiled.entry(schema.to_string()).or_default() += 1;
        state.profiled_entities.push(pretty_name.to_string());
    }

    fn report_skipped(&self, schema: &str, _table: &str, reason: SkipReason) {
        *self
            .state()
            .skipped
            .entry(reason.counter_name())
            .or_default()
            .entry(schema.to_string())
            .or_default() += 1;
    }

    fn report_failure(&self, pretty_name: &str, message: &str) {
        self.state().failures.push(ProfilingFailure {
            table: pretty_name.to_string(),
            message: message.to_string(),
        });
    }
}
