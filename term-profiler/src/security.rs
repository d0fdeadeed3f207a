//! Security utilities for the Term profiler.
//!
//! Credentials are held in [`SecureString`], which zeroizes its contents on
//! drop and never prints them. [`SqlSecurity`] delimits warehouse identifiers
//! before they are spliced into generated statements such as sampling queries
//! and `use database` directives.

use crate::error::{Result, TermError};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum identifier length accepted by the warehouse.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Convert to a regular string. The SecureString will be zeroized.
    pub fn into_string(mut self) -> String {
        let value = std::mem::take(&mut self.0);
        self.0.zeroize();
        value
    }

    /// Returns true if no secret is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecureString)
    }
}

/// SQL identifier validation and delimiting utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a warehouse identifier (database, schema or table name).
    ///
    /// Warehouse identifiers may legitimately contain spaces, dashes or mixed
    /// case once quoted, so only structurally broken names are rejected.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(TermError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates and delimits an identifier with double quotes.
    ///
    /// Embedded double quotes are doubled, so the result always refers to the
    /// exact stored name regardless of case folding.
    ///
    /// # Examples
    /// ```rust
    /// use term_profiler::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("orders").unwrap(), "\"orders\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::quote_identifier("").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Delimits each part and joins them into a dotted path.
    pub fn quote_path(parts: &[&str]) -> Result<String> {
        let quoted = parts
            .iter()
            .map(|part| Self::quote_identifier(part))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join("."))
    }

    /// Validates a user supplied regex used for allow/deny table patterns.
    pub fn validate_regex_pattern(pattern: &str) -> Result<Regex> {
        if pattern.len() > 1000 {
            return Err(TermError::SecurityError(
                "Regex pattern too long (max 1000 characters)".to_string(),
            ));
        }

        if pattern.contains('\0') {
            return Err(TermError::SecurityError(
                "Regex pattern cannot contain null bytes".to_string(),
            ));
        }

        // Only the classic catastrophic backtracking shapes are rejected.
        for dangerous in ["(.*)*", "(.*)+", "(a+)+", "(a*)*"] {
            if pattern.contains(dangerous) {
                return Err(TermError::SecurityError(
                    "Regex pattern might cause ReDoS attack".to_string(),
                ));
            }
        }

        Regex::new(pattern)
            .map_err(|e| TermError::SecurityError(format!("Invalid regex pattern: {e}")))
    }
}
