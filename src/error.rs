//! Error type shared by every stage of the pipeline.
//!
//! Nothing is retried: each variant aborts the run and is handed back to
//! the caller. An unrecognized check clause is deliberately *not* an error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which snapshot a lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSide {
    Actual,
    Target,
}

impl std::fmt::Display for SnapshotSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotSide::Actual => f.write_str("actual"),
            SnapshotSide::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported database scheme `{0}` (expected mysql:// or postgres://)")]
    UnsupportedScheme(String),

    #[error("connection url names no database")]
    NoDatabase,

    #[error("column {table}.{column} has unsupported type `{native}`")]
    UnsupportedType {
        table: String,
        column: String,
        native: String,
    },

    #[error("table `{0}` was listed but not found in the catalog")]
    MissingTable(String),

    #[error("table `{0}` is not part of the target schema")]
    UnknownTable(String),

    #[error("no definition for column {table}.{column} in the {side} snapshot")]
    MissingColumn {
        table: String,
        column: String,
        side: SnapshotSide,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no database url configured (use --url, DATABASE_URL or [database] url)")]
    MissingUrl,

    #[error("invalid schema snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unsupported_type(table: &str, column: &str, native: &str) -> Self {
        Error::UnsupportedType {
            table: table.to_string(),
            column: column.to_string(),
            native: native.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing_column(table: &str, column: &str, side: SnapshotSide) -> Self {
        Error::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
            side,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
