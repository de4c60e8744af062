//! Schema differ.
//!
//! Compares an *old* snapshot (what the database holds) with a *new* one
//! (what was declared) attribute by attribute. Pure and synchronous.

mod rules;

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::{
    AttributeValue, ColumnAttribute, ColumnDefinition, Dialect, SchemaSnapshot, TableDefinition,
};

pub use rules::{Change, SUPPRESSIONS, Suppression, is_suppressed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Modified,
    Deleted,
}

/// One changed column attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub attribute: ColumnAttribute,
    #[serde(rename = "newValue")]
    pub new_value: AttributeValue,
    #[serde(rename = "type")]
    pub kind: DiffKind,
}

/// Changes of a single table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDiff {
    pub name: String,
    pub kind: DiffKind,
    /// Column name → attribute changes. Whole-table deletions list every old
    /// column with no changes.
    pub columns: IndexMap<String, Vec<FieldDiff>>,
    pub deleted_columns: Vec<String>,
    pub unique_updated: bool,
}

impl TableDiff {
    fn new(name: &str, kind: DiffKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns: IndexMap::new(),
            deleted_columns: Vec::new(),
            unique_updated: false,
        }
    }

    /// A modification that changes nothing. Whole-table additions and
    /// deletions are never empty, even without columns.
    pub fn is_empty(&self) -> bool {
        self.kind == DiffKind::Modified
            && self.columns.is_empty()
            && self.deleted_columns.is_empty()
    }

    /// Whether `column` is created by this diff.
    pub fn adds_column(&self, column: &str) -> bool {
        self.columns.get(column).is_some_and(|fields| is_added_column(fields))
    }
}

/// A column diff describes a new column when its name itself was added.
pub fn is_added_column(fields: &[FieldDiff]) -> bool {
    fields
        .iter()
        .any(|f| f.attribute == ColumnAttribute::Name && f.kind == DiffKind::Added)
}

/// Ordered table diffs: deletions and modifications in old-snapshot order,
/// then additions in target order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchemaDiff {
    pub tables: Vec<TableDiff>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableDiff> {
        self.tables.iter()
    }

    pub fn table(&self, name: &str) -> Option<&TableDiff> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables the diff would drop.
    pub fn deleted_tables(&self) -> impl Iterator<Item = &TableDiff> {
        self.tables.iter().filter(|t| t.kind == DiffKind::Deleted)
    }
}

impl<'a> IntoIterator for &'a SchemaDiff {
    type Item = &'a TableDiff;
    type IntoIter = std::slice::Iter<'a, TableDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

/// Compare two versions of a column.
///
/// `old == None` stands for a column that does not exist yet: every
/// attribute of `new` comes back as added. Returns `None` when nothing
/// changed (after suppression rules).
pub fn compare_column(
    old: Option<&ColumnDefinition>,
    new: &ColumnDefinition,
    dialect: Dialect,
) -> Option<Vec<FieldDiff>> {
    let old_attrs = old.map(ColumnDefinition::attributes).unwrap_or_default();
    let new_attrs = new.attributes();

    let find = |attrs: &[(ColumnAttribute, AttributeValue)], attr: ColumnAttribute| {
        attrs
            .iter()
            .find(|(a, _)| *a == attr)
            .map(|(_, value)| value.clone())
    };

    let mut added = Vec::new();
    let mut modified = Vec::new();
    let mut deleted = Vec::new();

    for (attr, new_value) in &new_attrs {
        match find(&old_attrs, *attr) {
            None => added.push(FieldDiff {
                attribute: *attr,
                new_value: new_value.clone(),
                kind: DiffKind::Added,
            }),
            Some(old_value) if old_value != *new_value => {
                let change = Change {
                    old: &old_value,
                    new: new_value,
                    column: new,
                    dialect,
                };
                if !is_suppressed(*attr, DiffKind::Modified, &change) {
                    modified.push(FieldDiff {
                        attribute: *attr,
                        new_value: new_value.clone(),
                        kind: DiffKind::Modified,
                    });
                }
            }
            Some(_) => {}
        }
    }

    for (attr, old_value) in &old_attrs {
        if find(&new_attrs, *attr).is_some() {
            continue;
        }
        let change = Change {
            old: old_value,
            new: &AttributeValue::Null,
            column: new,
            dialect,
        };
        if !is_suppressed(*attr, DiffKind::Deleted, &change) {
            deleted.push(FieldDiff {
                attribute: *attr,
                new_value: AttributeValue::Null,
                kind: DiffKind::Deleted,
            });
        }
    }

    let mut result = added;
    result.append(&mut modified);
    result.append(&mut deleted);

    (!result.is_empty()).then_some(result)
}

/// Compare two versions of the same table.
pub fn compare_table(old: &TableDefinition, new: &TableDefinition, dialect: Dialect) -> TableDiff {
    let mut diff = TableDiff::new(&old.name, DiffKind::Modified);

    for old_column in &old.columns {
        match new.find_column(&old_column.name) {
            None => diff.deleted_columns.push(old_column.name.clone()),
            Some(new_column) => {
                if let Some(fields) = compare_column(Some(old_column), new_column, dialect) {
                    diff.columns.insert(old_column.name.clone(), fields);
                }
            }
        }
    }

    for new_column in &new.columns {
        if old.find_column(&new_column.name).is_none() {
            let fields = compare_column(None, new_column, dialect).unwrap_or_default();
            diff.columns.insert(new_column.name.clone(), fields);
        }
    }

    diff.unique_updated = old.unique_columns != new.unique_columns;
    diff
}

fn added_table(table: &TableDefinition, dialect: Dialect) -> TableDiff {
    let mut diff = TableDiff::new(&table.name, DiffKind::Added);
    for column in &table.columns {
        let fields = compare_column(None, column, dialect).unwrap_or_default();
        diff.columns.insert(column.name.clone(), fields);
    }
    diff.unique_updated = !table.unique_columns.is_empty();
    diff
}

fn deleted_table(table: &TableDefinition) -> TableDiff {
    let mut diff = TableDiff::new(&table.name, DiffKind::Deleted);
    for column in &table.columns {
        diff.columns.insert(column.name.clone(), Vec::new());
    }
    diff
}

/// Compute the diff turning `old` into `new`.
pub fn diff_schemas(old: &SchemaSnapshot, new: &SchemaSnapshot, dialect: Dialect) -> SchemaDiff {
    let mut tables = Vec::new();

    for old_table in &old.tables {
        let Some(new_table) = new.table(&old_table.name) else {
            tables.push(deleted_table(old_table));
            continue;
        };

        // declared columns may not carry their table name
        let mut new_table = new_table.clone();
        for column in &mut new_table.columns {
            column.table = old_table.name.clone();
        }

        let diff = compare_table(old_table, &new_table, dialect);
        if !diff.is_empty() {
            tables.push(diff);
        }
    }

    for new_table in &new.tables {
        if !old.contains(&new_table.name) {
            tables.push(added_table(new_table, dialect));
        }
    }

    SchemaDiff { tables }
}
