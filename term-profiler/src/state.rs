//! Persisted profiling state.
//!
//! A state handler remembers when each dataset was last profiled. Tables not
//! altered since then are skipped with [`SkipReason::AlreadyProfiled`].
//!
//! [`SkipReason::AlreadyProfiled`]: crate::policy::SkipReason::AlreadyProfiled

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::catalog::TableDescriptor;

/// Source of last-profiled timestamps, keyed by dataset identifier.
pub trait ProfilingStateHandler: Send + Sync {
    fn last_profiled(&self, dataset_name: &str) -> Option<DateTime<Utc>>;

    /// Returns true if the table has not changed since it was last profiled.
    ///
    /// Tables with an unknown alteration time are always profiled again.
    fn is_already_profiled(&self, dataset_name: &str, table: &TableDescriptor) -> bool {
        match (self.last_profiled(dataset_name), table.last_altered) {
            (Some(profiled), Some(altered)) => altered <= profiled,
            _ => false,
        }
    }
}

/// State handler backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryStateHandler {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryStateHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a dataset was profiled at `at`.
    pub fn record(&self, dataset_name: impl Into<String>, at: DateTime<Utc>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dataset_name.into(), at);
    }
}

impl ProfilingStateHandler for InMemoryStateHandler {
    fn last_profiled(&self, dataset_name: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dataset_name)
            .copied()
    }
}
