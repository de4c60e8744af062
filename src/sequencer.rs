//! Migration file naming and writing.
//!
//! Files are named `{YYYYMMDDHHMMSS}_{tags}_{table}.js`. Each written file
//! takes the next second after the previous one, so lexical order is apply
//! order.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDateTime};

use crate::builder::MigrationArtifact;
use crate::diff::{DiffKind, TableDiff, is_added_column};
use crate::error::{Error, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Kind of change recorded in a migration file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTag {
    TableCreated,
    TableDeleted,
    ColumnCreated,
    ColumnDeleted,
    ColumnModified,
}

impl ChangeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTag::TableCreated => "CT",
            ChangeTag::TableDeleted => "DT",
            ChangeTag::ColumnCreated => "CC",
            ChangeTag::ColumnDeleted => "DC",
            ChangeTag::ColumnModified => "CM",
        }
    }
}

impl fmt::Display for ChangeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags describing `diff`, deduplicated in first-seen order.
pub fn change_tags(diff: &TableDiff) -> Vec<ChangeTag> {
    match diff.kind {
        DiffKind::Added => return vec![ChangeTag::TableCreated],
        DiffKind::Deleted => return vec![ChangeTag::TableDeleted],
        DiffKind::Modified => {}
    }

    let mut tags = Vec::new();
    if !diff.deleted_columns.is_empty() {
        tags.push(ChangeTag::ColumnDeleted);
    }
    for fields in diff.columns.values() {
        let tag = if is_added_column(fields) {
            ChangeTag::ColumnCreated
        } else {
            ChangeTag::ColumnModified
        };
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// File name for `artifact` stamped at `at`.
pub fn file_name(artifact: &MigrationArtifact, at: NaiveDateTime) -> String {
    let tags: Vec<&str> = change_tags(&artifact.diff)
        .iter()
        .map(ChangeTag::as_str)
        .collect();
    format!(
        "{}_{}_{}.js",
        at.format(TIMESTAMP_FORMAT),
        tags.join("-"),
        artifact.table
    )
}

/// Writes artifacts into a migration directory.
#[derive(Debug, Clone)]
pub struct Sequencer {
    directory: PathBuf,
    base: NaiveDateTime,
}

impl Sequencer {
    /// Sequencer stamping from the current local time.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            base: Local::now().naive_local(),
        }
    }

    pub fn starting_at(mut self, base: NaiveDateTime) -> Self {
        self.base = base;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Name every non-empty artifact, in order, without touching the disk.
    pub fn plan<'a>(
        &self,
        artifacts: &'a [MigrationArtifact],
    ) -> Vec<(String, &'a MigrationArtifact)> {
        artifacts
            .iter()
            .filter(|artifact| !artifact.is_empty())
            .enumerate()
            .map(|(offset, artifact)| {
                let at = self.base + Duration::seconds(offset as i64);
                (file_name(artifact, at), artifact)
            })
            .collect()
    }

    /// Write every non-empty artifact and return the created paths.
    pub fn write(&self, artifacts: &[MigrationArtifact]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.directory).map_err(|e| Error::io(&self.directory, e))?;

        let mut written = Vec::new();
        for (name, artifact) in self.plan(artifacts) {
            let path = self.directory.join(&name);
            std::fs::write(&path, artifact.render()).map_err(|e| Error::io(&path, e))?;
            log::info!("wrote migration {}", name);
            written.push(path);
        }
        Ok(written)
    }
}
