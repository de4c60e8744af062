//! Canonical schema model.
//!
//! Both sides of a comparison use these types: the *actual* snapshot read
//! from a live database by the inspectors, and the *target* snapshot
//! produced by the declaration layer (loaded here from JSON).
//!
//! # Example
//! ```
//! use migragen::schema::SchemaSnapshot;
//!
//! let json = r#"[{
//!     "name": "users",
//!     "columns": [
//!         { "name": "id", "table": "users", "data_type": "integer",
//!           "is_nullable": false, "is_primary_key": true, "has_auto_increment": true },
//!         { "name": "email", "table": "users", "data_type": "string", "max_length": 255 }
//!     ]
//! }]"#;
//!
//! let snapshot = SchemaSnapshot::from_json(json).unwrap();
//! assert_eq!(snapshot.tables[0].columns.len(), 2);
//! ```

mod check;
mod column;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use check::{BetweenRange, CheckKind, ComparisonOperator, NumeralCheck};
pub use column::{
    AttributeValue, ColumnAttribute, ColumnChecks, ColumnDefinition, DataType, DefaultValue,
    NOW_SENTINEL, ReferentialAction,
};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "mariadb")]
    Mysql,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl Dialect {
    /// Pick the dialect from a connection URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "mysql" | "mariadb" => Some(Dialect::Mysql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Mysql => f.write_str("mysql"),
            Dialect::Postgres => f.write_str("postgres"),
        }
    }
}

/// Table definition with its columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Columns carrying a single-column uniqueness constraint, in column order.
    #[serde(rename = "uniqueColumns", default)]
    pub unique_columns: Vec<String>,
    #[serde(rename = "referencedTables", default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_tables: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            unique_columns: Vec::new(),
            referenced_tables: Vec::new(),
        }
    }

    /// Builder: append a column, taking over this table's name and
    /// registering it in the unique set when flagged unique.
    pub fn column(mut self, mut column: ColumnDefinition) -> Self {
        column.table = self.name.clone();
        if column.is_unique {
            self.unique_columns.push(column.name.clone());
        }
        if let Some(target) = &column.foreign_key_table {
            if !self.referenced_tables.contains(target) {
                self.referenced_tables.push(target.clone());
            }
        }
        self.columns.push(column);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

/// Ordered list of tables.
///
/// A target snapshot is expected to list referenced tables before the
/// tables referencing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableDefinition>,
}

impl SchemaSnapshot {
    pub fn new(tables: Vec<TableDefinition>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDefinition> {
        self.table(table).and_then(|t| t.find_column(column))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Keep only the named table.
    pub fn retain_table(&mut self, name: &str) {
        self.tables.retain(|t| t.name == name);
    }

    /// Parse a snapshot. Columns without a `table` take their table's name.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut snapshot: Self = serde_json::from_str(json)?;
        for table in &mut snapshot.tables {
            for column in &mut table.columns {
                if column.table.is_empty() {
                    column.table = table.name.clone();
                }
            }
        }
        Ok(snapshot)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder_tracks_uniques_and_refs() {
        let user_id =
            ColumnDefinition::new("user_id", "", DataType::Integer).references("users", "id");
        let table = TableDefinition::new("orders")
            .column(ColumnDefinition::new("id", "", DataType::Integer).increments().primary_key())
            .column(ColumnDefinition::new("ref", "", DataType::String).unique())
            .column(user_id);

        assert_eq!(table.unique_columns, vec!["ref".to_string()]);
        assert_eq!(table.referenced_tables, vec!["users".to_string()]);
        assert!(table.columns.iter().all(|c| c.table == "orders"));
    }

    #[test]
    fn test_snapshot_json_is_a_bare_array() {
        let snapshot = SchemaSnapshot::new(vec![TableDefinition::new("users")]);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.starts_with('['));

        let back = SchemaSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_columns_inherit_table_name() {
        let json = r#"[{"name": "users", "columns": [{"name": "id", "data_type": "integer"}]}]"#;
        let snapshot = SchemaSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.column("users", "id").unwrap().table, "users");
    }

    #[test]
    fn test_retain_table() {
        let mut snapshot = SchemaSnapshot::new(vec![
            TableDefinition::new("users"),
            TableDefinition::new("orders"),
        ]);
        snapshot.retain_table("orders");
        assert_eq!(snapshot.tables.len(), 1);
        assert!(snapshot.contains("orders"));
    }

    #[test]
    fn test_dialect_from_scheme() {
        assert_eq!(Dialect::from_scheme("mariadb"), Some(Dialect::Mysql));
        assert_eq!(Dialect::from_scheme("postgresql"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_scheme("sqlite"), None);
    }
}
