//! Drift reconciliation between the migration ledger and the files on disk.
//!
//! A migration file that the ledger never recorded is left over from an
//! earlier run that was not applied. It is deleted before new files are
//! generated so the two never coexist.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Extensions the migration runner loads.
pub const MIGRATION_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts"];

/// Names of the migration files in `directory`, sorted.
pub fn migration_files(directory: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(directory, e))?.path();
        if !path.is_file() {
            continue;
        }
        let known = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MIGRATION_EXTENSIONS.contains(&ext));
        if !known {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

/// Files in `directory` that are missing from `applied`, limited to names
/// containing `table` when given.
pub fn stale_files(
    directory: &Path,
    applied: &[String],
    table: Option<&str>,
) -> Result<Vec<String>> {
    Ok(migration_files(directory)?
        .into_iter()
        .filter(|name| !applied.contains(name))
        .filter(|name| table.is_none_or(|t| name.contains(t)))
        .collect())
}

/// Delete stale files and return their names.
///
/// The directory is created when missing.
pub fn reconcile(directory: &Path, applied: &[String], table: Option<&str>) -> Result<Vec<String>> {
    if !directory.exists() {
        fs::create_dir_all(directory).map_err(|e| Error::io(directory, e))?;
        log::debug!("created migration directory {}", directory.display());
        return Ok(Vec::new());
    }

    let stale = stale_files(directory, applied, table)?;
    if !stale.is_empty() {
        log::warn!(
            "{} migration(s) were never applied and have been removed",
            stale.len()
        );
    }

    for name in &stale {
        let path = directory.join(name);
        fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        log::warn!("removed unapplied migration {}", name);
    }

    Ok(stale)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "exports.up = knex => knex\n").unwrap();
    }

    #[test]
    fn test_deletes_only_unapplied_files() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["A.js", "B.js", "C.js"] {
            touch(tmp.path(), name);
        }

        let applied = vec!["A.js".to_string(), "B.js".to_string()];
        let deleted = reconcile(tmp.path(), &applied, None).unwrap();

        assert_eq!(deleted, vec!["C.js".to_string()]);
        assert_eq!(
            migration_files(tmp.path()).unwrap(),
            vec!["A.js".to_string(), "B.js".to_string()]
        );
    }

    #[test]
    fn test_table_filter_limits_deletion() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "20240101000000_CT_users.js");
        touch(tmp.path(), "20240101000001_CT_orders.js");

        let deleted = reconcile(tmp.path(), &[], Some("orders")).unwrap();
        assert_eq!(deleted, vec!["20240101000001_CT_orders.js".to_string()]);
        assert!(tmp.path().join("20240101000000_CT_users.js").exists());
    }

    #[test]
    fn test_ignores_foreign_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "README.md");
        fs::create_dir(tmp.path().join("archive.js")).unwrap();

        assert!(reconcile(tmp.path(), &[], None).unwrap().is_empty());
        assert!(tmp.path().join("README.md").exists());
    }

    #[test]
    fn test_missing_directory_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("migrations");

        assert!(reconcile(&dir, &[], None).unwrap().is_empty());
        assert!(dir.is_dir());
    }
}
