//! Knex migration builder.
//!
//! Turns each [`TableDiff`] into a forward (`exports.up`) and a backward
//! (`exports.down`) block. Column values always come from the snapshots,
//! never from the diff payload: the target snapshot for forward code and
//! the actual snapshot for backward code.

mod column;

use serde::Serialize;

use crate::diff::{DiffKind, SchemaDiff, TableDiff, is_added_column};
use crate::error::{Error, Result, SnapshotSide};
use crate::schema::{ColumnDefinition, Dialect, SchemaSnapshot};

pub use column::{chain, drop_column, initializer, js_string};

const ALTER_TABLE: &str = "\tknex.schema.table(tableName, table => {";
const CREATE_TABLE: &str = "\tknex.schema.createTableIfNotExists(tableName, table => {";
const DROP_TABLE: &str = "\tknex.schema.dropTableIfExists(tableName)";
const CLOSE_TABLE: &str = "\t})";

/// Generated code for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationArtifact {
    pub table: String,
    /// Body of `exports.up`, empty when there is nothing to do.
    pub forward: String,
    /// Body of `exports.down`.
    pub backward: String,
    pub diff: TableDiff,
}

impl MigrationArtifact {
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// The complete migration module.
    pub fn render(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("const tableName = {}\n\n", js_string(&self.table)));
        output.push_str("exports.up = knex =>\n");
        output.push_str(&self.forward);
        output.push_str("\n\nexports.down = knex =>\n");
        output.push_str(&self.backward);
        output.push('\n');
        output
    }
}

/// Builds artifacts for a diff against its two snapshots.
pub struct MigrationBuilder<'a> {
    target: &'a SchemaSnapshot,
    actual: &'a SchemaSnapshot,
    dialect: Dialect,
}

impl<'a> MigrationBuilder<'a> {
    pub fn new(target: &'a SchemaSnapshot, actual: &'a SchemaSnapshot, dialect: Dialect) -> Self {
        Self {
            target,
            actual,
            dialect,
        }
    }

    /// One artifact per table diff, in diff order.
    pub fn build(&self, diff: &SchemaDiff) -> Result<Vec<MigrationArtifact>> {
        diff.iter().map(|table| self.build_table(table)).collect()
    }

    pub fn build_table(&self, table: &TableDiff) -> Result<MigrationArtifact> {
        let (forward, backward) = if table.is_empty() {
            (String::new(), String::new())
        } else {
            (self.forward(table)?, self.backward(table)?)
        };

        Ok(MigrationArtifact {
            table: table.name.clone(),
            forward,
            backward,
            diff: table.clone(),
        })
    }

    fn lookup(
        &self,
        table: &str,
        column: &str,
        side: SnapshotSide,
    ) -> Result<&'a ColumnDefinition> {
        let snapshot = match side {
            SnapshotSide::Actual => self.actual,
            SnapshotSide::Target => self.target,
        };
        snapshot
            .column(table, column)
            .ok_or_else(|| Error::missing_column(table, column, side))
    }

    fn forward(&self, table: &TableDiff) -> Result<String> {
        if table.kind == DiffKind::Deleted {
            return Ok(DROP_TABLE.to_string());
        }

        let open = if table.kind == DiffKind::Added {
            CREATE_TABLE
        } else {
            ALTER_TABLE
        };
        let mut lines = vec![open.to_string()];

        for (name, fields) in &table.columns {
            let definition = self.lookup(&table.name, name, SnapshotSide::Target)?;
            let alter = !is_added_column(fields);
            lines.push(statement(chain(definition, &table.name, self.dialect, alter)));
        }
        for name in &table.deleted_columns {
            lines.push(statement(drop_column(name)));
        }

        lines.push(CLOSE_TABLE.to_string());
        Ok(lines.join("\n"))
    }

    fn backward(&self, table: &TableDiff) -> Result<String> {
        if table.kind == DiffKind::Added {
            return Ok(DROP_TABLE.to_string());
        }

        let recreate = table.kind == DiffKind::Deleted;
        let open = if recreate { CREATE_TABLE } else { ALTER_TABLE };
        let mut lines = vec![open.to_string()];

        for (name, fields) in &table.columns {
            if !recreate && is_added_column(fields) {
                lines.push(statement(drop_column(name)));
                continue;
            }
            let definition = self.lookup(&table.name, name, SnapshotSide::Actual)?;
            lines.push(statement(chain(definition, &table.name, self.dialect, !recreate)));
        }
        for name in &table.deleted_columns {
            let definition = self.lookup(&table.name, name, SnapshotSide::Actual)?;
            lines.push(statement(chain(definition, &table.name, self.dialect, false)));
        }

        lines.push(CLOSE_TABLE.to_string());
        Ok(lines.join("\n"))
    }
}

fn statement(code: String) -> String {
    format!("\t\t{}", code)
}

/// Build every artifact of `diff`.
pub fn build_migrations(
    diff: &SchemaDiff,
    target: &SchemaSnapshot,
    actual: &SchemaSnapshot,
    dialect: Dialect,
) -> Result<Vec<MigrationArtifact>> {
    MigrationBuilder::new(target, actual, dialect).build(diff)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diff::diff_schemas;
    use crate::schema::{DataType, TableDefinition};

    fn id() -> ColumnDefinition {
        ColumnDefinition::new("id", "", DataType::Integer).increments().primary_key()
    }

    fn build(
        old: &SchemaSnapshot,
        new: &SchemaSnapshot,
        dialect: Dialect,
    ) -> Vec<MigrationArtifact> {
        let diff = diff_schemas(old, new, dialect);
        build_migrations(&diff, new, old, dialect).unwrap()
    }

    #[test]
    fn test_added_column_module() {
        let old = SchemaSnapshot::new(vec![TableDefinition::new("users").column(id())]);
        let new = SchemaSnapshot::new(vec![
            TableDefinition::new("users")
                .column(id())
                .column(ColumnDefinition::new("email", "", DataType::String).length(255)),
        ]);

        let artifacts = build(&old, &new, Dialect::Mysql);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(
            artifacts[0].render(),
            "const tableName = 'users'\n\
             \n\
             exports.up = knex =>\n\
             \tknex.schema.table(tableName, table => {\n\
             \t\ttable.string('email').nullable()\n\
             \t})\n\
             \n\
             exports.down = knex =>\n\
             \tknex.schema.table(tableName, table => {\n\
             \t\ttable.dropColumn('email')\n\
             \t})\n"
        );
    }

    #[test]
    fn test_deleted_table_is_recreated_backward() {
        let sessions = TableDefinition::new("sessions")
            .column(id())
            .column(ColumnDefinition::new("token", "", DataType::String).length(64).not_null());
        let old = SchemaSnapshot::new(vec![sessions]);
        let new = SchemaSnapshot::default();

        let artifact = &build(&old, &new, Dialect::Postgres)[0];
        assert_eq!(artifact.forward, "\tknex.schema.dropTableIfExists(tableName)");
        assert_eq!(
            artifact.backward,
            "\tknex.schema.createTableIfNotExists(tableName, table => {\n\
             \t\ttable.increments('id').notNullable().primary()\n\
             \t\ttable.string('token', 64).notNullable()\n\
             \t})"
        );
    }

    #[test]
    fn test_deleted_table_without_columns_is_dropped() {
        let old = SchemaSnapshot::new(vec![TableDefinition::new("ghost")]);
        let new = SchemaSnapshot::default();

        let artifacts = build(&old, &new, Dialect::Postgres);
        assert_eq!(artifacts.len(), 1);
        assert!(!artifacts[0].is_empty());
        assert_eq!(artifacts[0].forward, "\tknex.schema.dropTableIfExists(tableName)");
        assert_eq!(
            artifacts[0].backward,
            "\tknex.schema.createTableIfNotExists(tableName, table => {\n\t})"
        );

        let planned = crate::sequencer::Sequencer::new("migrations").plan(&artifacts);
        assert_eq!(planned.len(), 1);
        assert!(planned[0].0.ends_with("_DT_ghost.js"));
    }

    #[test]
    fn test_added_table_without_columns_is_created() {
        let old = SchemaSnapshot::default();
        let new = SchemaSnapshot::new(vec![TableDefinition::new("ghost")]);

        let artifact = &build(&old, &new, Dialect::Postgres)[0];
        assert_eq!(
            artifact.forward,
            "\tknex.schema.createTableIfNotExists(tableName, table => {\n\t})"
        );
        assert_eq!(artifact.backward, "\tknex.schema.dropTableIfExists(tableName)");
    }

    #[test]
    fn test_added_table_creates_and_drops() {
        let old = SchemaSnapshot::default();
        let new = SchemaSnapshot::new(vec![TableDefinition::new("tags").column(id())]);

        let artifact = &build(&old, &new, Dialect::Mysql)[0];
        assert!(artifact.forward.starts_with("\tknex.schema.createTableIfNotExists"));
        assert!(!artifact.forward.contains(".alter()"));
        assert_eq!(artifact.backward, "\tknex.schema.dropTableIfExists(tableName)");
    }

    #[test]
    fn test_unique_change_redeclares_with_alter() {
        let old = SchemaSnapshot::new(vec![
            TableDefinition::new("orders")
                .column(ColumnDefinition::new("ref", "", DataType::String)),
        ]);
        let new = SchemaSnapshot::new(vec![
            TableDefinition::new("orders")
                .column(ColumnDefinition::new("ref", "", DataType::String).unique()),
        ]);

        let artifact = &build(&old, &new, Dialect::Mysql)[0];
        assert!(artifact.forward.contains("table.string('ref').nullable().unique().alter()"));
        assert!(artifact.backward.contains("table.string('ref').nullable().alter()"));
    }

    #[test]
    fn test_deleted_column_is_reconstructed_backward() {
        let old = SchemaSnapshot::new(vec![
            TableDefinition::new("users")
                .column(id())
                .column(ColumnDefinition::new("age", "", DataType::Integer)),
        ]);
        let new = SchemaSnapshot::new(vec![TableDefinition::new("users").column(id())]);

        let artifact = &build(&old, &new, Dialect::Mysql)[0];
        assert!(artifact.forward.contains("\t\ttable.dropColumn('age')"));
        assert!(artifact.backward.contains("\t\ttable.integer('age').nullable()\n"));
        assert!(!artifact.backward.contains(".alter()"));
    }

    #[test]
    fn test_missing_definition_is_an_error() {
        let old = SchemaSnapshot::new(vec![TableDefinition::new("users").column(id())]);
        let new = SchemaSnapshot::new(vec![
            TableDefinition::new("users")
                .column(id())
                .column(ColumnDefinition::new("email", "", DataType::String)),
        ]);
        let diff = diff_schemas(&old, &new, Dialect::Mysql);

        // target snapshot swapped for one lacking `email`
        let err = build_migrations(&diff, &old, &old, Dialect::Mysql).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingColumn { side: SnapshotSide::Target, .. }
        ));
    }

    #[test]
    fn test_empty_table_diff_renders_nothing() {
        let diff = TableDiff {
            name: "users".into(),
            kind: DiffKind::Modified,
            columns: Default::default(),
            deleted_columns: Vec::new(),
            unique_updated: true,
        };
        let snapshot = SchemaSnapshot::default();
        let artifact = MigrationBuilder::new(&snapshot, &snapshot, Dialect::Mysql)
            .build_table(&diff)
            .unwrap();
        assert!(artifact.is_empty());
    }
}
