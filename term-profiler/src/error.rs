//! Error types for the Term profiler.
//!
//! This module follows the same strategy as the rest of Term: a single
//! `thiserror`-derived enum, [`TermError`], plus a crate-wide [`Result`] alias.
//!
//! Errors are split by blast radius:
//!
//! - [`TermError::ConfigInconsistency`] and [`TermError::Connection`] abort the
//!   whole profiling pass for a database.
//! - [`TermError::ProfilingQuery`] belongs to a single table and is normally
//!   isolated and reported instead of propagated.
//!
//! Skipping a table is never an error; see [`crate::policy::SkipReason`].

use thiserror::Error;

/// Boxed error type used for wrapped driver and service failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for the Term profiler.
#[derive(Error, Debug)]
pub enum TermError {
    /// The catalog snapshot handed to a profiling pass is malformed.
    #[error("Catalog inconsistency in '{database}.{schema}': {message}")]
    ConfigInconsistency {
        /// Database being profiled
        database: String,
        /// Schema containing the malformed entry
        schema: String,
        /// Detailed error message
        message: String,
    },

    /// A database-scoped warehouse connection could not be established.
    #[error("Connection to database '{database}' failed: {message}")]
    Connection {
        /// Database the connection was scoped to
        database: String,
        /// Detailed error message
        message: String,
        /// Optional underlying driver error
        #[source]
        source: Option<BoxError>,
    },

    /// Profiling a single table failed.
    #[error("Profiling failed for '{table}': {message}")]
    ProfilingQuery {
        /// Display name of the table
        table: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a new catalog inconsistency error.
    pub fn config_inconsistency(
        database: impl Into<String>,
        schema: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigInconsistency {
            database: database.into(),
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(database: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            database: database.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new connection error with a source error.
    pub fn connection_with_source(
        database: impl Into<String>,
        message: impl Into<String>,
        source: BoxError,
    ) -> Self {
        Self::Connection {
            database: database.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new per-table profiling error.
    pub fn profiling_query(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProfilingQuery {
            table: table.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new per-table profiling error with a source error.
    pub fn profiling_query_with_source(
        table: impl Into<String>,
        message: impl Into<String>,
        source: BoxError,
    ) -> Self {
        Self::ProfilingQuery {
            table: table.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true if this error aborts the whole profiling pass.
    pub fn is_fatal_to_pass(&self) -> bool {
        !matches!(self, TermError::ProfilingQuery { .. })
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
            other => TermError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
                other => TermError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
