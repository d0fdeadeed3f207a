//! Catalog snapshot types supplied by schema discovery.
//!
//! The profiler never mutates a snapshot; it only reads the schema order and
//! the per-schema table lists.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TermError};

/// Kind of a catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    /// Ordinary table stored in the warehouse
    #[serde(alias = "BASE TABLE")]
    Base,
    /// External table backed by object storage
    #[serde(alias = "EXTERNAL TABLE")]
    External,
    /// View
    View,
}

impl TableKind {
    /// Parses the `TABLE_TYPE` column of the information schema.
    pub fn from_table_type(table_type: &str) -> Self {
        match table_type.trim().to_ascii_uppercase().as_str() {
            "EXTERNAL TABLE" => TableKind::External,
            "VIEW" | "MATERIALIZED VIEW" => TableKind::View,
            _ => TableKind::Base,
        }
    }

    /// Returns true for external tables.
    pub fn is_external(&self) -> bool {
        matches!(self, TableKind::External)
    }
}

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub kind: TableKind,
    /// Row-count estimate, unknown for some table kinds
    pub rows_count: Option<u64>,
    pub size_in_bytes: Option<u64>,
    pub last_altered: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl TableDescriptor {
    /// Creates an ordinary table with no statistics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Base,
            rows_count: None,
            size_in_bytes: None,
            last_altered: None,
            comment: None,
        }
    }

    /// Creates an external table with no statistics.
    pub fn external(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(TableKind::External)
    }

    pub fn with_kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_rows_count(mut self, rows: u64) -> Self {
        self.rows_count = Some(rows);
        self
    }

    pub fn with_size_in_bytes(mut self, bytes: u64) -> Self {
        self.size_in_bytes = Some(bytes);
        self
    }

    pub fn with_last_altered(mut self, at: DateTime<Utc>) -> Self {
        self.last_altered = Some(at);
        self
    }
}

/// Immutable snapshot of one database's schemas and tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub database: String,
    /// Schema names in discovery order
    pub schemas: Vec<String>,
    /// Table lists keyed by schema name, each in discovery order
    pub tables_by_schema: HashMap<String, Vec<TableDescriptor>>,
}

impl CatalogSnapshot {
    /// Creates an empty snapshot for a database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    /// Appends a schema and its tables.
    ///
    /// Adding a schema that is already listed appends to its table list.
    pub fn with_schema(
        mut self,
        schema: impl Into<String>,
        tables: impl IntoIterator<Item = TableDescriptor>,
    ) -> Self {
        let schema = schema.into();
        if !self.tables_by_schema.contains_key(&schema) {
            self.schemas.push(schema.clone());
        }
        self.tables_by_schema.entry(schema).or_default().extend(tables);
        self
    }

    /// Checks that every schema is listed once and every table list belongs
    /// to a listed schema.
    pub fn validate(&self) -> Result<()> {
        let mut listed = HashSet::with_capacity(self.schemas.len());
        for schema in &self.schemas {
            if !listed.insert(schema.as_str()) {
                return Err(TermError::config_inconsistency(
                    &self.database,
                    schema,
                    "schema is listed more than once",
                ));
            }
        }

        let mut unlisted: Vec<&str> = self
            .tables_by_schema
            .keys()
            .map(String::as_str)
            .filter(|schema| !listed.contains(schema))
            .collect();
        unlisted.sort_unstable();
        match unlisted.first() {
            Some(schema) => Err(TermError::config_inconsistency(
                &self.database,
                *schema,
                "table list belongs to a schema that is not listed",
            )),
            None => Ok(()),
        }
    }

    /// Tables of a listed schema.
    ///
    /// A listed schema without a table list is a catalog inconsistency.
    pub fn tables(&self, schema: &str) -> Result<&[TableDescriptor]> {
        self.tables_by_schema
            .get(schema)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                TermError::config_inconsistency(
                    &self.database,
                    schema,
                    "schema is listed but has no table list",
                )
            })
    }

    /// Total number of tables across all schemas.
    pub fn table_count(&self) -> usize {
        self.tables_by_schema.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_kind_from_table_type() {
        assert_eq!(TableKind::from_table_type("EXTERNAL TABLE"), TableKind::External);
        assert_eq!(TableKind::from_table_type("base table"), TableKind::Base);
        assert_eq!(TableKind::from_table_type("VIEW"), TableKind::View);
        assert!(TableKind::External.is_external());
        assert!(!TableKind::View.is_external());
    }

    #[test]
    fn test_snapshot_preserves_schema_order() {
        let snapshot = CatalogSnapshot::new("DB")
            .with_schema("Z_SCHEMA", vec![TableDescriptor::new("A")])
            .with_schema("A_SCHEMA", vec![TableDescriptor::new("B"), TableDescriptor::new("C")]);

        assert_eq!(snapshot.schemas, vec!["Z_SCHEMA", "A_SCHEMA"]);
        assert_eq!(snapshot.table_count(), 3);
        assert_eq!(snapshot.tables("A_SCHEMA").unwrap()[1].name, "C");
    }

    #[test]
    fn test_missing_table_list_is_inconsistent() {
        let mut snapshot = CatalogSnapshot::new("DB");
        snapshot.schemas.push("GHOST".to_string());

        let err = snapshot.tables("GHOST").unwrap_err();
        assert!(matches!(err, TermError::ConfigInconsistency { .. }));
    }

    #[test]
    fn test_repeated_schema_extends_table_list() {
        let snapshot = CatalogSnapshot::new("DB")
            .with_schema("S", [TableDescriptor::new("A")])
            .with_schema("S", [TableDescriptor::new("B")]);

        assert_eq!(snapshot.schemas, vec!["S"]);
        let names: Vec<_> = snapshot.tables("S").unwrap().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(snapshot.table_count(), 2);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_duplicate_schema_listing_is_inconsistent() {
        let snapshot: CatalogSnapshot = serde_json::from_value(serde_json::json!({
            "database": "DB",
            "schemas": ["S", "S"],
            "tables_by_schema": { "S": [] }
        }))
        .unwrap();

        let err = snapshot.validate().unwrap_err();
        assert!(matches!(err, TermError::ConfigInconsistency { .. }));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unlisted_table_list_is_inconsistent() {
        let mut snapshot = CatalogSnapshot::new("DB").with_schema("S", [TableDescriptor::new("A")]);
        snapshot
            .tables_by_schema
            .insert("HIDDEN".to_string(), vec![TableDescriptor::new("B")]);

        let err = snapshot.validate().unwrap_err();
        assert!(matches!(err, TermError::ConfigInconsistency { .. }));
        assert!(err.to_string().contains("not listed"));
    }

    #[test]
    fn test_table_kind_deserializes_information_schema_names() {
        let kind: TableKind = serde_json::from_str("\"EXTERNAL TABLE\"").unwrap();
        assert_eq!(kind, TableKind::External);
        let kind: TableKind = serde_json::from_str("\"BASE\"").unwrap();
        assert_eq!(kind, TableKind::Base);
    }
}
