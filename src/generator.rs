//! End-to-end migration generation.
//!
//! Generation runs in two phases. [`Generator::plan`] inspects the live
//! database, diffs it against the target snapshot and builds the code
//! without touching the disk. [`Generator::write`] reconciles the
//! migration directory with the ledger and writes the planned files. A
//! caller can confirm destructive changes between the two.

use std::path::PathBuf;

use crate::builder::{MigrationArtifact, build_migrations};
use crate::config::{Config, DEFAULT_LEDGER_TABLE, ledger_tables};
use crate::connection::Connection;
use crate::diff::{SchemaDiff, diff_schemas};
use crate::error::{Error, Result};
use crate::inspect::inspect_schema;
use crate::reconcile::reconcile;
use crate::schema::{Dialect, SchemaSnapshot};
use crate::sequencer::Sequencer;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub directory: PathBuf,
    pub ledger_table: String,
    pub include_ledger_tables: bool,
    /// Restrict the run to one table.
    pub table: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./migrations"),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            include_ledger_tables: false,
            table: None,
        }
    }
}

impl GenerateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            directory: config.migrations.directory.clone(),
            ledger_table: config.migrations.table_name.clone(),
            include_ledger_tables: config.migrations.include_ledger_tables,
            table: None,
        }
    }

    pub fn with_table(mut self, table: Option<String>) -> Self {
        self.table = table;
        self
    }

    /// Tables the inspector must not report.
    pub fn skipped_tables(&self) -> Vec<String> {
        if self.include_ledger_tables {
            return Vec::new();
        }
        let mut skipped = ledger_tables(DEFAULT_LEDGER_TABLE).to_vec();
        for name in ledger_tables(&self.ledger_table) {
            if !skipped.contains(&name) {
                skipped.push(name);
            }
        }
        skipped
    }
}

/// Everything a run would write, computed without side effects.
#[derive(Debug, Clone)]
pub struct Plan {
    pub target: SchemaSnapshot,
    pub actual: SchemaSnapshot,
    pub diff: SchemaDiff,
    pub artifacts: Vec<MigrationArtifact>,
}

impl Plan {
    /// Names of the tables the run would drop.
    pub fn deleted_tables(&self) -> Vec<&str> {
        self.diff.deleted_tables().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Files removed and created by [`Generator::write`].
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub removed: Vec<String>,
    pub written: Vec<PathBuf>,
}

/// Narrow both snapshots to `table`.
///
/// The table must exist in the target.
pub fn filter_table(
    target: &mut SchemaSnapshot,
    actual: &mut SchemaSnapshot,
    table: &str,
) -> Result<()> {
    if !target.contains(table) {
        return Err(Error::UnknownTable(table.to_string()));
    }
    target.retain_table(table);
    actual.retain_table(table);
    Ok(())
}

/// Diff and build against an already inspected snapshot.
pub fn plan_snapshots(
    mut target: SchemaSnapshot,
    mut actual: SchemaSnapshot,
    dialect: Dialect,
    table: Option<&str>,
) -> Result<Plan> {
    if let Some(table) = table {
        filter_table(&mut target, &mut actual, table)?;
    }

    let diff = diff_schemas(&actual, &target, dialect);
    let artifacts = build_migrations(&diff, &target, &actual, dialect)?;
    log::debug!("{} table diff(s), {} artifact(s)", diff.len(), artifacts.len());

    Ok(Plan {
        target,
        actual,
        diff,
        artifacts,
    })
}

pub struct Generator<'a> {
    connection: &'a Connection,
    options: GenerateOptions,
}

impl<'a> Generator<'a> {
    pub fn new(connection: &'a Connection, options: GenerateOptions) -> Self {
        Self {
            connection,
            options,
        }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Snapshot of the live database, ledger tables excluded.
    pub async fn inspect(&self) -> Result<SchemaSnapshot> {
        let inspector = self.connection.inspector();
        inspect_schema(&inspector, &self.options.skipped_tables()).await
    }

    pub async fn plan(&self, target: SchemaSnapshot) -> Result<Plan> {
        let actual = self.inspect().await?;
        plan_snapshots(
            target,
            actual,
            self.connection.dialect(),
            self.options.table.as_deref(),
        )
    }

    /// Delete files the ledger never recorded.
    pub async fn reconcile(&self) -> Result<Vec<String>> {
        let applied = self
            .connection
            .applied_migrations(&self.options.ledger_table)
            .await?;
        reconcile(&self.options.directory, &applied, self.options.table.as_deref())
    }

    /// Reconcile the directory, then write the planned files.
    pub async fn write(&self, plan: &Plan) -> Result<Outcome> {
        let removed = self.reconcile().await?;
        let written = Sequencer::new(&self.options.directory).write(&plan.artifacts)?;
        Ok(Outcome { removed, written })
    }
}
