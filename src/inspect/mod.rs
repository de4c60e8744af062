//! Live database inspection.
//!
//! An [`Inspector`] reads one engine's catalog and reports tables, table
//! metadata and columns in the canonical model. [`inspect_schema`] walks
//! every table and folds constraints onto the columns they cover.

pub mod mysql;
mod normalize;
pub mod postgres;

use indexmap::IndexMap;

use crate::error::Result;
use crate::schema::{
    CheckKind, ColumnDefinition, Dialect, ReferentialAction, SchemaSnapshot, TableDefinition,
};

pub use mysql::MySqlInspector;
pub use normalize::{is_current_time_expression, typed_default};
pub use postgres::PostgresInspector;

/// Foreign key target of a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub table: String,
    pub column: String,
    pub on_update: Option<ReferentialAction>,
    pub on_delete: Option<ReferentialAction>,
}

/// A check clause after classification.
///
/// `kind` is `None` when the clause matched no known pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCheck {
    pub column: Option<String>,
    pub kind: Option<CheckKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey(Reference),
    Check(ParsedCheck),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    /// Covered columns, in key order.
    pub columns: Vec<String>,
    pub deferrable: bool,
}

/// Table-level catalog data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    /// Constraints keyed by name, in catalog order.
    pub constraints: IndexMap<String, Constraint>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Register `column` under constraint `name`, creating the constraint
    /// on first sight. Catalog queries return one row per key column.
    pub fn add_constraint_column(
        &mut self,
        name: &str,
        kind: ConstraintKind,
        column: Option<String>,
        deferrable: bool,
    ) {
        let constraint = self
            .constraints
            .entry(name.to_string())
            .or_insert_with(|| Constraint {
                name: name.to_string(),
                kind,
                columns: Vec::new(),
                deferrable,
            });
        if let Some(column) = column {
            if !constraint.columns.contains(&column) {
                constraint.columns.push(column);
            }
        }
    }

    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .values()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
    }
}

/// Catalog reader for one engine.
#[allow(async_fn_in_trait)]
pub trait Inspector {
    fn dialect(&self) -> Dialect;

    /// Base tables of the inspected database or schema.
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn table_info(&self, table: &str) -> Result<TableMetadata>;

    /// Columns of `table` in ordinal order.
    async fn column_info(&self, table: &str) -> Result<Vec<ColumnDefinition>>;
}

/// Inspector selected from a connection's dialect.
#[derive(Debug, Clone)]
pub enum DialectInspector {
    MySql(MySqlInspector),
    Postgres(PostgresInspector),
}

impl Inspector for DialectInspector {
    fn dialect(&self) -> Dialect {
        match self {
            DialectInspector::MySql(inner) => inner.dialect(),
            DialectInspector::Postgres(inner) => inner.dialect(),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        match self {
            DialectInspector::MySql(inner) => inner.list_tables().await,
            DialectInspector::Postgres(inner) => inner.list_tables().await,
        }
    }

    async fn table_info(&self, table: &str) -> Result<TableMetadata> {
        match self {
            DialectInspector::MySql(inner) => inner.table_info(table).await,
            DialectInspector::Postgres(inner) => inner.table_info(table).await,
        }
    }

    async fn column_info(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        match self {
            DialectInspector::MySql(inner) => inner.column_info(table).await,
            DialectInspector::Postgres(inner) => inner.column_info(table).await,
        }
    }
}

/// Copy a classified check onto `column`.
pub fn apply_check(column: &mut ColumnDefinition, kind: &CheckKind) {
    let checks = &mut column.checks;
    match kind {
        CheckKind::Regexp(pattern) => checks.check_regexp = Some(pattern.clone()),
        CheckKind::Numeral(numeral) => checks.check_numeral = Some(*numeral),
        CheckKind::Between(range) => checks.check_between = Some(range.clone()),
        CheckKind::In(values) => checks.check_in = Some(values.clone()),
        CheckKind::NotIn(values) => checks.check_not_in = Some(values.clone()),
        CheckKind::Positive => checks.check_positive = true,
        CheckKind::Negative => checks.check_negative = true,
    }
}

/// Whether `name` is the engine's own name for an unnamed check on
/// `table.column`: `<table>_chk_<n>` on MySQL, `<table>_<column>_check[<n>]`
/// on PostgreSQL.
pub fn is_generated_check_name(name: &str, table: &str, column: &str, dialect: Dialect) -> bool {
    let suffix = match dialect {
        Dialect::Mysql => name
            .strip_prefix(table)
            .and_then(|rest| rest.strip_prefix("_chk_"))
            .filter(|n| !n.is_empty()),
        Dialect::Postgres => name
            .strip_prefix(table)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_prefix(column))
            .and_then(|rest| rest.strip_prefix("_check")),
    };
    suffix.is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

/// Record a user-chosen constraint name for the check `kind` on `column`.
fn apply_check_name(column: &mut ColumnDefinition, kind: &CheckKind, name: &str) {
    let checks = &mut column.checks;
    let slot = match kind {
        CheckKind::Regexp(_) => &mut checks.check_regexp_custom,
        CheckKind::Numeral(_) => &mut checks.check_numeral_custom,
        CheckKind::Between(_) => &mut checks.check_between_custom,
        CheckKind::In(_) => &mut checks.check_in_custom,
        CheckKind::NotIn(_) => &mut checks.check_not_in_custom,
        CheckKind::Positive => &mut checks.check_positive_custom,
        CheckKind::Negative => &mut checks.check_negative_custom,
    };
    *slot = Some(name.to_string());
}

/// Fold table constraints onto the columns of `table`.
pub fn apply_table_metadata(table: &mut TableDefinition, meta: &TableMetadata, dialect: Dialect) {
    for constraint in meta.constraints.values() {
        match &constraint.kind {
            ConstraintKind::PrimaryKey => {
                for name in &constraint.columns {
                    if let Some(column) = table.find_column_mut(name) {
                        column.is_primary_key = true;
                    }
                }
            }
            ConstraintKind::Unique => {
                // composite unique keys are indexes, not column flags
                if let [name] = constraint.columns.as_slice() {
                    if let Some(column) = table.find_column_mut(name) {
                        column.is_unique = true;
                    }
                }
            }
            ConstraintKind::ForeignKey(reference) => {
                let Some(name) = constraint.columns.first() else {
                    continue;
                };
                let Some(column) = table.find_column_mut(name) else {
                    log::debug!("foreign key {} targets unknown column {}", constraint.name, name);
                    continue;
                };
                column.foreign_key_table = Some(reference.table.clone());
                column.foreign_key_column = Some(reference.column.clone());
                column.on_update = reference.on_update;
                column.on_delete = reference.on_delete;
                if constraint.deferrable && dialect == Dialect::Postgres {
                    column.constraint_deferred = true;
                }
                if !table.referenced_tables.contains(&reference.table) {
                    table.referenced_tables.push(reference.table.clone());
                }
            }
            ConstraintKind::Check(check) => {
                let target = check
                    .column
                    .as_ref()
                    .or_else(|| constraint.columns.first());
                let (Some(name), Some(kind)) = (target, &check.kind) else {
                    log::debug!("check {} left unclassified", constraint.name);
                    continue;
                };
                let generated =
                    is_generated_check_name(&constraint.name, &table.name, name, dialect);
                match table.find_column_mut(name) {
                    Some(column) => {
                        apply_check(column, kind);
                        if !generated {
                            apply_check_name(column, kind, &constraint.name);
                        }
                    }
                    None => {
                        log::debug!("check {} targets unknown column {}", constraint.name, name)
                    }
                }
            }
        }
    }

    table.unique_columns = table
        .columns
        .iter()
        .filter(|c| c.is_unique)
        .map(|c| c.name.clone())
        .collect();
}

/// Read the whole database into a snapshot, skipping `skip` tables.
///
/// Any catalog failure aborts the snapshot. Tables without columns are
/// kept: PostgreSQL allows them.
pub async fn inspect_schema<I: Inspector>(
    inspector: &I,
    skip: &[String],
) -> Result<SchemaSnapshot> {
    let dialect = inspector.dialect();
    let mut snapshot = SchemaSnapshot::default();

    for name in inspector.list_tables().await? {
        if skip.contains(&name) {
            log::debug!("skipping ledger table {}", name);
            continue;
        }

        log::debug!("inspecting {}", name);
        let columns = inspector.column_info(&name).await?;
        if columns.is_empty() {
            log::debug!("table {} has no columns", name);
        }

        let mut table = TableDefinition::new(&name);
        table.columns = columns;
        let meta = inspector.table_info(&name).await?;
        apply_table_metadata(&mut table, &meta, dialect);
        snapshot.tables.push(table);
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use std::cell::RefCell;

    use super::*;
    use crate::error::Error;
    use crate::schema::{BetweenRange, DataType};

    fn orders() -> TableDefinition {
        let mut table = TableDefinition::new("orders");
        for (name, data_type) in [
            ("id", DataType::Integer),
            ("ref", DataType::String),
            ("user_id", DataType::Integer),
            ("qty", DataType::Integer),
        ] {
            table.columns.push(ColumnDefinition::new(name, "orders", data_type));
        }
        table
    }

    fn metadata() -> TableMetadata {
        let mut meta = TableMetadata::new("orders");
        meta.add_constraint_column("PRIMARY", ConstraintKind::PrimaryKey, Some("id".into()), false);
        meta.add_constraint_column(
            "orders_ref_unique",
            ConstraintKind::Unique,
            Some("ref".into()),
            false,
        );
        meta.add_constraint_column(
            "orders_user_id_foreign",
            ConstraintKind::ForeignKey(Reference {
                table: "users".into(),
                column: "id".into(),
                on_update: None,
                on_delete: Some(ReferentialAction::Cascade),
            }),
            Some("user_id".into()),
            true,
        );
        meta.add_constraint_column(
            "orders_qty_check",
            ConstraintKind::Check(ParsedCheck {
                column: Some("qty".into()),
                kind: Some(CheckKind::Between(BetweenRange::Single(1, 10))),
            }),
            None,
            false,
        );
        meta
    }

    #[test]
    fn test_constraints_fold_onto_columns() {
        let mut table = orders();
        apply_table_metadata(&mut table, &metadata(), Dialect::Mysql);

        assert!(table.find_column("id").unwrap().is_primary_key);
        assert!(table.find_column("ref").unwrap().is_unique);
        assert_eq!(table.unique_columns, vec!["ref".to_string()]);
        assert_eq!(table.referenced_tables, vec!["users".to_string()]);

        let user_id = table.find_column("user_id").unwrap();
        assert_eq!(user_id.foreign_key_table.as_deref(), Some("users"));
        assert_eq!(user_id.on_delete, Some(ReferentialAction::Cascade));
        assert!(!user_id.constraint_deferred);

        let qty = table.find_column("qty").unwrap();
        assert_eq!(qty.checks.check_between, Some(BetweenRange::Single(1, 10)));
    }

    #[test]
    fn test_deferred_flag_only_on_postgres() {
        let mut table = orders();
        apply_table_metadata(&mut table, &metadata(), Dialect::Postgres);
        assert!(table.find_column("user_id").unwrap().constraint_deferred);
    }

    #[test]
    fn test_composite_primary_key_marks_every_column() {
        let mut table = orders();
        let mut meta = TableMetadata::new("orders");
        meta.add_constraint_column("pk", ConstraintKind::PrimaryKey, Some("id".into()), false);
        meta.add_constraint_column("pk", ConstraintKind::PrimaryKey, Some("ref".into()), false);
        meta.add_constraint_column("uq", ConstraintKind::Unique, Some("user_id".into()), false);
        meta.add_constraint_column("uq", ConstraintKind::Unique, Some("qty".into()), false);

        apply_table_metadata(&mut table, &meta, Dialect::Mysql);
        assert_eq!(meta.primary_key().unwrap().columns, vec!["id", "ref"]);
        assert!(table.find_column("ref").unwrap().is_primary_key);
        assert!(!table.find_column("qty").unwrap().is_unique);
        assert!(table.unique_columns.is_empty());
    }

    #[test]
    fn test_unclassified_check_is_tolerated() {
        let mut table = orders();
        let mut meta = TableMetadata::new("orders");
        meta.add_constraint_column(
            "odd",
            ConstraintKind::Check(ParsedCheck {
                column: Some("qty".into()),
                kind: None,
            }),
            None,
            false,
        );
        meta.add_constraint_column(
            "ghost",
            ConstraintKind::Check(ParsedCheck {
                column: Some("missing".into()),
                kind: Some(CheckKind::Positive),
            }),
            None,
            false,
        );

        let before = table.clone();
        apply_table_metadata(&mut table, &meta, Dialect::Postgres);
        assert_eq!(table, before);
    }

    fn check(kind: CheckKind) -> ConstraintKind {
        ConstraintKind::Check(ParsedCheck {
            column: Some("qty".into()),
            kind: Some(kind),
        })
    }

    // ========================================================================
    // Check constraint names
    // ========================================================================

    #[test]
    fn test_generated_check_names() {
        assert!(is_generated_check_name("orders_chk_1", "orders", "qty", Dialect::Mysql));
        assert!(is_generated_check_name("orders_chk_12", "orders", "qty", Dialect::Mysql));
        assert!(!is_generated_check_name("orders_chk_", "orders", "qty", Dialect::Mysql));
        assert!(!is_generated_check_name("orders_qty_check", "orders", "qty", Dialect::Mysql));

        assert!(is_generated_check_name("orders_qty_check", "orders", "qty", Dialect::Postgres));
        assert!(is_generated_check_name("orders_qty_check1", "orders", "qty", Dialect::Postgres));
        assert!(!is_generated_check_name("qty_in_range", "orders", "qty", Dialect::Postgres));
        assert!(!is_generated_check_name("orders_chk_1", "orders", "qty", Dialect::Postgres));
    }

    #[test]
    fn test_custom_check_name_is_recorded() {
        let mut table = orders();
        let mut meta = TableMetadata::new("orders");
        let in_set = check(CheckKind::In(vec!["1".into()]));
        meta.add_constraint_column("qty_in_set", in_set, None, false);
        meta.add_constraint_column("orders_chk_2", check(CheckKind::Positive), None, false);

        apply_table_metadata(&mut table, &meta, Dialect::Mysql);
        let qty = table.find_column("qty").unwrap();
        assert_eq!(qty.checks.check_in_custom.as_deref(), Some("qty_in_set"));
        assert!(qty.checks.check_positive);
        assert_eq!(qty.checks.check_positive_custom, None);
    }

    #[test]
    fn test_named_check_matches_declared_column() {
        let mut declared = ColumnDefinition::new("qty", "orders", DataType::Integer);
        declared.checks.check_in = Some(vec!["1".into(), "2".into()]);
        declared.checks.check_in_custom = Some("orders_status_in".into());

        let mut table = orders();
        let mut meta = TableMetadata::new("orders");
        meta.add_constraint_column(
            "orders_status_in",
            check(CheckKind::In(vec!["1".into(), "2".into()])),
            None,
            false,
        );
        apply_table_metadata(&mut table, &meta, Dialect::Postgres);

        let inspected = table.find_column("qty").unwrap();
        let diff = crate::diff::compare_column(Some(inspected), &declared, Dialect::Postgres);
        assert_eq!(diff, None);
    }

    #[test]
    fn test_postgres_generated_check_name_is_dropped() {
        let mut table = orders();
        apply_table_metadata(&mut table, &metadata(), Dialect::Postgres);
        assert_eq!(table.find_column("qty").unwrap().checks.check_between_custom, None);
    }

    // ========================================================================
    // Snapshot assembly
    // ========================================================================

    /// Canned catalog. `broken` fails its column query.
    struct FakeInspector {
        tables: Vec<TableDefinition>,
        broken: Option<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeInspector {
        fn new(tables: Vec<TableDefinition>) -> Self {
            Self {
                tables,
                broken: None,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Inspector for FakeInspector {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn list_tables(&self) -> Result<Vec<String>> {
            Ok(self.tables.iter().map(|t| t.name.clone()).collect())
        }

        async fn table_info(&self, table: &str) -> Result<TableMetadata> {
            self.calls.borrow_mut().push(format!("table {}", table));
            if table == "orders" {
                Ok(metadata())
            } else {
                Ok(TableMetadata::new(table))
            }
        }

        async fn column_info(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
            self.calls.borrow_mut().push(format!("columns {}", table));
            if self.broken == Some(table) {
                return Err(Error::MissingTable(table.to_string()));
            }
            self.tables
                .iter()
                .find(|t| t.name == table)
                .map(|t| t.columns.clone())
                .ok_or_else(|| Error::MissingTable(table.to_string()))
        }
    }

    fn ledger() -> TableDefinition {
        TableDefinition::new("knex_migrations")
            .column(ColumnDefinition::new("id", "", DataType::Integer).increments())
    }

    #[tokio::test]
    async fn test_inspect_schema_skips_ledger_and_folds_metadata() {
        let inspector = FakeInspector::new(vec![ledger(), orders(), TableDefinition::new("empty")]);
        let skip = vec!["knex_migrations".to_string()];

        let snapshot = inspect_schema(&inspector, &skip).await.unwrap();
        let names: Vec<&str> = snapshot.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "empty"]);
        assert!(snapshot.column("orders", "id").unwrap().is_primary_key);
        assert!(snapshot.table("empty").unwrap().columns.is_empty());
        assert_eq!(
            *inspector.calls.borrow(),
            vec!["columns orders", "table orders", "columns empty", "table empty"]
        );
    }

    #[tokio::test]
    async fn test_inspect_schema_aborts_on_catalog_failure() {
        let mut inspector = FakeInspector::new(vec![orders(), TableDefinition::new("users")]);
        inspector.broken = Some("users");

        let err = inspect_schema(&inspector, &[]).await.unwrap_err();
        assert!(matches!(err, Error::MissingTable(name) if name == "users"));
    }
}
