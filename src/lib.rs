//! Knex migration generator for MySQL and PostgreSQL.
//!
//! Reads the live structure of a database, compares it with a declared
//! target snapshot and writes reversible knex migrations for the
//! difference.
//!
//! # Example
//! ```no_run
//! use migragen::{Connection, GenerateOptions, Generator, SchemaSnapshot};
//!
//! async fn example() -> migragen::Result<()> {
//!     let target = SchemaSnapshot::from_json(&std::fs::read_to_string("schema.json").unwrap())?;
//!     let connection = Connection::connect("postgres://app@localhost/app", "public").await?;
//!
//!     let generator = Generator::new(&connection, GenerateOptions::default());
//!     let plan = generator.plan(target).await?;
//!     let outcome = generator.write(&plan).await?;
//!     println!("{} file(s) written", outcome.written.len());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod diff;
pub mod error;
pub mod generator;
pub mod inspect;
pub mod reconcile;
pub mod schema;
pub mod sequencer;

pub use builder::{MigrationArtifact, MigrationBuilder, build_migrations};
pub use config::Config;
pub use connection::Connection;
pub use diff::{
    DiffKind, FieldDiff, SchemaDiff, TableDiff, compare_column, compare_table, diff_schemas,
};
pub use error::{Error, Result};
pub use generator::{GenerateOptions, Generator, Plan, plan_snapshots};
pub use inspect::{DialectInspector, Inspector, inspect_schema};
pub use reconcile::reconcile;
pub use schema::{ColumnDefinition, DataType, Dialect, SchemaSnapshot, TableDefinition};
pub use sequencer::Sequencer;
