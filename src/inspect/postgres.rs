//! PostgreSQL catalog inspector.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::PgPool;

use super::normalize::typed_default;
use super::{ConstraintKind, Inspector, ParsedCheck, Reference, TableMetadata};
use crate::error::{Error, Result};
use crate::schema::{
    BetweenRange, CheckKind, ColumnDefinition, DataType, DefaultValue, Dialect, NumeralCheck,
    ReferentialAction,
};

/// Map an `information_schema.columns.data_type` value.
pub fn map_type(data_type: &str) -> Option<DataType> {
    let mapped = match data_type {
        "integer" | "smallint" => DataType::Integer,
        "bigint" => DataType::BigInteger,
        "character varying" | "character" => DataType::String,
        "text" => DataType::Text,
        "boolean" => DataType::Boolean,
        "numeric" => DataType::Decimal,
        "real" => DataType::Float,
        "double precision" => DataType::Double,
        "date" => DataType::Date,
        "timestamp with time zone" | "timestamp without time zone" => DataType::Timestamp,
        "time with time zone" | "time without time zone" => DataType::Time,
        "json" => DataType::Json,
        "jsonb" => DataType::Jsonb,
        "uuid" => DataType::Uuid,
        "bytea" => DataType::Binary,
        "USER-DEFINED" => DataType::Enum,
        _ => return None,
    };
    Some(mapped)
}

static CAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::[A-Za-z_][\w ]*(\[\])?").expect("valid regex"));

/// Normalize a `column_default` value.
///
/// Returns the default and whether it came from a sequence.
pub fn normalize_default(raw: Option<&str>, data_type: DataType) -> (Option<DefaultValue>, bool) {
    let Some(raw) = raw else {
        return (None, false);
    };
    if raw.contains("nextval(") {
        return (None, true);
    }

    let stripped = CAST.replace_all(raw, "");
    let stripped = stripped.trim();
    if stripped.eq_ignore_ascii_case("NULL") {
        return (None, false);
    }

    let literal = stripped
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| stripped.to_string());

    (Some(typed_default(&literal, data_type)), false)
}

static REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~ '([^']+)'::text").expect("valid regex"));
static REGEXP_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\$\d:").expect("valid regex"));
static NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([<>=!]{1,2})\s*(-?\d+)").expect("valid regex"));
static BETWEEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\w+ [><=]{1,2} (-?\d+)\) AND \(\w+ [><=]{1,2} (-?\d+)\)").expect("valid regex")
});
static LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)'").expect("valid regex"));
static SIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\w+ ([<>]) 0\)").expect("valid regex"));
static CHECK_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\(([^()]+)\)::text)|(?:\((\w+) [><=]{1,2} -?\d+\))|(?:length\(+(\w+)\))")
        .expect("valid regex")
});

fn quoted_values(clause: &str) -> Vec<String> {
    LITERAL
        .captures_iter(clause)
        .map(|caps| caps[1].replace('\\', ""))
        .collect()
}

fn check_column(clause: &str) -> Option<String> {
    if let Some(caps) = CHECK_COLUMN.captures(clause) {
        return caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string());
    }
    clause
        .split(' ')
        .next()
        .map(|token| token.replace(['(', ')'], ""))
        .filter(|token| !token.is_empty())
}

/// Classify an `information_schema.check_constraints.check_clause`.
pub fn parse_check(clause: &str) -> ParsedCheck {
    let kind = if clause.contains('~') {
        REGEXP.captures(clause).map(|caps| {
            let pattern = caps[1].replace("\\\\\\\\", "\\");
            CheckKind::Regexp(REGEXP_GROUP.replace_all(&pattern, "(?:").into_owned())
        })
    } else if clause.contains("length") {
        NUMERAL.captures(clause).and_then(|caps| {
            let operator = caps[1].parse().ok()?;
            let value = caps[2].parse().ok()?;
            Some(CheckKind::Numeral(NumeralCheck::new(operator, value)))
        })
    } else if clause.contains("AND") {
        let pairs: Vec<(i64, i64)> = BETWEEN
            .captures_iter(clause)
            .filter_map(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
            .collect();
        BetweenRange::merged(&pairs).map(CheckKind::Between)
    } else if clause.contains("<> ALL") {
        Some(CheckKind::NotIn(quoted_values(clause)))
    } else if clause.contains("= ANY") {
        Some(CheckKind::In(quoted_values(clause)))
    } else {
        SIGN.captures(clause).map(|caps| {
            if &caps[1] == ">" {
                CheckKind::Positive
            } else {
                CheckKind::Negative
            }
        })
    };

    ParsedCheck {
        column: check_column(clause),
        kind,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    udt_schema: String,
    udt_name: String,
    column_default: Option<String>,
    character_maximum_length: Option<i64>,
    numeric_precision: Option<i64>,
    numeric_scale: Option<i64>,
    is_nullable: bool,
    collation_name: Option<String>,
    column_comment: Option<String>,
    is_unique: bool,
    is_primary_key: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ConstraintRow {
    constraint_name: String,
    constraint_type: String,
    column_name: Option<String>,
    deferrable: bool,
    referenced_table: Option<String>,
    referenced_column: Option<String>,
    update_rule: Option<String>,
    delete_rule: Option<String>,
    check_clause: Option<String>,
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn column_from_row(table: &str, row: &ColumnRow) -> Result<ColumnDefinition> {
    let data_type = map_type(&row.data_type)
        .ok_or_else(|| Error::unsupported_type(table, &row.column_name, &row.data_type))?;

    let (default_value, sequence) = normalize_default(row.column_default.as_deref(), data_type);

    let mut column = ColumnDefinition::new(&row.column_name, table, data_type);
    column.default_value = default_value;
    column.has_auto_increment = sequence;
    column.max_length = to_u32(row.character_maximum_length);
    column.numeric_precision = to_u32(row.numeric_precision);
    column.numeric_scale = to_u32(row.numeric_scale);
    column.is_nullable = row.is_nullable;
    column.is_unique = row.is_unique;
    column.is_primary_key = row.is_primary_key;
    column.use_tz = row.data_type == "timestamp with time zone";
    column.collation = row.collation_name.clone();
    column.comment = row.column_comment.clone().filter(|c| !c.is_empty());
    Ok(column)
}

fn constraint_kind(row: &ConstraintRow) -> Option<ConstraintKind> {
    match row.constraint_type.as_str() {
        "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
        "UNIQUE" => Some(ConstraintKind::Unique),
        "FOREIGN KEY" => Some(ConstraintKind::ForeignKey(Reference {
            table: row.referenced_table.clone()?,
            column: row.referenced_column.clone()?,
            on_update: row.update_rule.as_deref().and_then(ReferentialAction::from_rule),
            on_delete: row.delete_rule.as_deref().and_then(ReferentialAction::from_rule),
        })),
        "CHECK" => {
            let clause = row.check_clause.as_deref()?;
            // implicit NOT NULL constraints show up as checks
            if clause.ends_with("IS NOT NULL") {
                return None;
            }
            Some(ConstraintKind::Check(parse_check(clause)))
        }
        _ => None,
    }
}

const LIST_TABLES: &str = "SELECT table_name::text \
     FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const TABLE_EXISTS: &str = "SELECT c.relname::text \
     FROM pg_catalog.pg_class c \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('r', 'p')";

const CONSTRAINTS: &str = "SELECT tc.constraint_name::text AS constraint_name, \
            tc.constraint_type::text AS constraint_type, \
            kcu.column_name::text AS column_name, \
            (tc.is_deferrable = 'YES') AS deferrable, \
            ref.table_name::text AS referenced_table, \
            ref.column_name::text AS referenced_column, \
            rc.update_rule::text AS update_rule, \
            rc.delete_rule::text AS delete_rule, \
            cc.check_clause::text AS check_clause \
     FROM information_schema.table_constraints tc \
     LEFT JOIN information_schema.key_column_usage kcu \
       ON kcu.constraint_schema = tc.constraint_schema \
      AND kcu.constraint_name = tc.constraint_name \
      AND kcu.table_name = tc.table_name \
     LEFT JOIN information_schema.referential_constraints rc \
       ON rc.constraint_schema = tc.constraint_schema \
      AND rc.constraint_name = tc.constraint_name \
     LEFT JOIN information_schema.key_column_usage ref \
       ON ref.constraint_schema = rc.unique_constraint_schema \
      AND ref.constraint_name = rc.unique_constraint_name \
      AND ref.ordinal_position = kcu.position_in_unique_constraint \
     LEFT JOIN information_schema.check_constraints cc \
       ON cc.constraint_schema = tc.constraint_schema \
      AND cc.constraint_name = tc.constraint_name \
     WHERE tc.table_schema = $1 AND tc.table_name = $2 \
     ORDER BY tc.constraint_name, kcu.ordinal_position";

const COLUMNS: &str = "SELECT c.column_name::text AS column_name, \
            c.data_type::text AS data_type, \
            c.udt_schema::text AS udt_schema, \
            c.udt_name::text AS udt_name, \
            c.column_default::text AS column_default, \
            c.character_maximum_length::int8 AS character_maximum_length, \
            c.numeric_precision::int8 AS numeric_precision, \
            c.numeric_scale::int8 AS numeric_scale, \
            (c.is_nullable = 'YES') AS is_nullable, \
            c.collation_name::text AS collation_name, \
            col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, \
                            c.ordinal_position::int) AS column_comment, \
            EXISTS ( \
                SELECT 1 FROM information_schema.table_constraints tc \
                JOIN information_schema.key_column_usage k \
                  ON k.constraint_schema = tc.constraint_schema \
                 AND k.constraint_name = tc.constraint_name \
                WHERE tc.table_schema = c.table_schema AND tc.table_name = c.table_name \
                  AND tc.constraint_type = 'UNIQUE' AND k.column_name = c.column_name \
                  AND (SELECT count(*) FROM information_schema.key_column_usage k2 \
                       WHERE k2.constraint_schema = tc.constraint_schema \
                         AND k2.constraint_name = tc.constraint_name) = 1 \
            ) AS is_unique, \
            EXISTS ( \
                SELECT 1 FROM information_schema.table_constraints tc \
                JOIN information_schema.key_column_usage k \
                  ON k.constraint_schema = tc.constraint_schema \
                 AND k.constraint_name = tc.constraint_name \
                WHERE tc.table_schema = c.table_schema AND tc.table_name = c.table_name \
                  AND tc.constraint_type = 'PRIMARY KEY' AND k.column_name = c.column_name \
            ) AS is_primary_key \
     FROM information_schema.columns c \
     WHERE c.table_schema = $1 AND c.table_name = $2 \
     ORDER BY c.ordinal_position";

const ENUM_LABELS: &str = "SELECT e.enumlabel::text \
     FROM pg_catalog.pg_enum e \
     JOIN pg_catalog.pg_type t ON t.oid = e.enumtypid \
     JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
     WHERE n.nspname = $1 AND t.typname = $2 \
     ORDER BY e.enumsortorder";

/// Inspector over one PostgreSQL schema.
#[derive(Debug, Clone)]
pub struct PostgresInspector {
    pool: PgPool,
    schema: String,
}

impl PostgresInspector {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn enum_labels(&self, type_schema: &str, type_name: &str) -> Result<Vec<String>> {
        let labels = sqlx::query_scalar::<_, String>(ENUM_LABELS)
            .bind(type_schema)
            .bind(type_name)
            .fetch_all(&self.pool)
            .await?;
        Ok(labels)
    }
}

impl Inspector for PostgresInspector {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables = sqlx::query_scalar::<_, String>(LIST_TABLES)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;
        Ok(tables)
    }

    async fn table_info(&self, table: &str) -> Result<TableMetadata> {
        sqlx::query_scalar::<_, String>(TABLE_EXISTS)
            .bind(&self.schema)
            .bind(table)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::MissingTable(table.to_string()))?;

        let mut meta = TableMetadata::new(table);

        let rows = sqlx::query_as::<_, ConstraintRow>(CONSTRAINTS)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let Some(kind) = constraint_kind(&row) else {
                log::debug!("ignoring {} constraint {}", row.constraint_type, row.constraint_name);
                continue;
            };
            meta.add_constraint_column(&row.constraint_name, kind, row.column_name, row.deferrable);
        }

        Ok(meta)
    }

    async fn column_info(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let rows = sqlx::query_as::<_, ColumnRow>(COLUMNS)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut column = column_from_row(table, row)?;
            if column.data_type == DataType::Enum {
                let labels = self.enum_labels(&row.udt_schema, &row.udt_name).await?;
                if labels.is_empty() {
                    return Err(Error::unsupported_type(table, &row.column_name, &row.udt_name));
                }
                column.enum_values = Some(labels);
            }
            columns.push(column);
        }
        Ok(columns)
    }
}
