//! Generation pipeline without a live database: snapshots are loaded from
//! JSON, diffed, built and written into a temporary migration directory.

use std::fs;

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;

use migragen::reconcile::{migration_files, reconcile};
use migragen::{Dialect, SchemaSnapshot, Sequencer, plan_snapshots};

const ACTUAL: &str = r#"[
    {
        "name": "users",
        "columns": [
            {"name": "id", "data_type": "integer", "is_nullable": false,
             "is_primary_key": true, "has_auto_increment": true},
            {"name": "nickname", "data_type": "string", "max_length": 32}
        ]
    },
    {
        "name": "legacy",
        "columns": [
            {"name": "id", "data_type": "integer", "is_nullable": false}
        ]
    }
]"#;

const TARGET: &str = r#"[
    {
        "name": "users",
        "columns": [
            {"name": "id", "data_type": "integer", "is_nullable": false,
             "is_primary_key": true, "has_auto_increment": true},
            {"name": "nickname", "data_type": "string", "max_length": 32},
            {"name": "email", "data_type": "string", "max_length": 255,
             "is_nullable": false, "is_unique": true}
        ],
        "uniqueColumns": ["email"]
    },
    {
        "name": "tags",
        "columns": [
            {"name": "id", "data_type": "integer", "is_nullable": false,
             "is_primary_key": true, "has_auto_increment": true},
            {"name": "label", "data_type": "string", "max_length": 40,
             "checkIn": ["red", "green"]}
        ]
    }
]"#;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(23, 59, 58))
        .unwrap()
}

fn snapshots() -> (SchemaSnapshot, SchemaSnapshot) {
    (
        SchemaSnapshot::from_json(TARGET).unwrap(),
        SchemaSnapshot::from_json(ACTUAL).unwrap(),
    )
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn test_diff_order_follows_actual_then_target() {
    let (target, actual) = snapshots();
    let plan = plan_snapshots(target, actual, Dialect::Mysql, None).unwrap();

    let names: Vec<&str> = plan.diff.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["users", "legacy", "tags"]);
    assert_eq!(plan.deleted_tables(), vec!["legacy"]);
    assert!(plan.diff.table("users").unwrap().adds_column("email"));
}

#[test]
fn test_diff_serializes_to_json() {
    let (target, actual) = snapshots();
    let plan = plan_snapshots(target, actual, Dialect::Postgres, None).unwrap();

    let value = serde_json::to_value(&plan.diff).unwrap();
    assert_eq!(value[0]["name"], "users");
    assert_eq!(value[0]["columns"]["email"][0]["attribute"], "name");
    assert_eq!(value[0]["columns"]["email"][0]["type"], "added");
}

#[test]
fn test_table_filter() {
    let (target, actual) = snapshots();
    let plan = plan_snapshots(target, actual, Dialect::Mysql, Some("tags")).unwrap();
    assert_eq!(plan.artifacts.len(), 1);
    assert_eq!(plan.artifacts[0].table, "tags");
}

// ============================================================================
// Writing
// ============================================================================

#[test]
fn test_generation_writes_sequenced_files() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("migrations");

    let (target, actual) = snapshots();
    let plan = plan_snapshots(target, actual, Dialect::Mysql, None).unwrap();
    let written = Sequencer::new(&dir).starting_at(base()).write(&plan.artifacts).unwrap();

    assert_eq!(written.len(), 3);
    assert_eq!(
        migration_files(&dir).unwrap(),
        vec![
            "20240309235958_CC_users.js".to_string(),
            "20240309235959_DT_legacy.js".to_string(),
            "20240310000000_CT_tags.js".to_string(),
        ]
    );

    let users = fs::read_to_string(dir.join("20240309235958_CC_users.js")).unwrap();
    assert!(users.starts_with("const tableName = 'users'\n"));
    assert!(users.contains("table.string('email').notNullable().unique()"));
    assert!(users.contains("table.dropColumn('email')"));

    let tags = fs::read_to_string(dir.join("20240310000000_CT_tags.js")).unwrap();
    assert!(tags.contains("knex.schema.createTableIfNotExists(tableName, table => {"));
    assert!(tags.contains("table.increments('id')"));
    assert!(tags.contains(".checkIn(['red', 'green'])"));

    let legacy = fs::read_to_string(dir.join("20240309235959_DT_legacy.js")).unwrap();
    assert!(legacy.contains("exports.up = knex =>\n\tknex.schema.dropTableIfExists(tableName)"));
}

#[test]
fn test_unapplied_files_are_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("20240101000000_CT_users.js"), "applied").unwrap();
    fs::write(dir.join("20240102000000_CC_users.js"), "stale").unwrap();

    let applied = vec!["20240101000000_CT_users.js".to_string()];
    let removed = reconcile(dir, &applied, None).unwrap();
    assert_eq!(removed, vec!["20240102000000_CC_users.js".to_string()]);

    let (target, actual) = snapshots();
    let plan = plan_snapshots(target, actual, Dialect::Mysql, Some("users")).unwrap();
    Sequencer::new(dir).starting_at(base()).write(&plan.artifacts).unwrap();

    assert_eq!(
        migration_files(dir).unwrap(),
        vec![
            "20240101000000_CT_users.js".to_string(),
            "20240309235958_CC_users.js".to_string(),
        ]
    );
}

#[test]
fn test_no_changes_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let actual = SchemaSnapshot::from_json(ACTUAL).unwrap();

    let plan = plan_snapshots(actual.clone(), actual, Dialect::Postgres, None).unwrap();
    let written = Sequencer::new(tmp.path()).write(&plan.artifacts).unwrap();

    assert!(plan.is_empty());
    assert!(written.is_empty());
}
