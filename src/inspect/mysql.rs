//! MySQL / MariaDB catalog inspector.

use std::sync::LazyLock;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, value},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded},
};
use regex::Regex;
use sqlx::MySqlPool;

use super::normalize::typed_default;
use super::{ConstraintKind, Inspector, ParsedCheck, Reference, TableMetadata};
use crate::error::{Error, Result};
use crate::schema::{
    BetweenRange, CheckKind, ColumnDefinition, DataType, DefaultValue, Dialect, NumeralCheck,
    ReferentialAction,
};

/// A parsed `COLUMN_TYPE` value such as `decimal(10,2) unsigned`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub base: String,
    /// Parenthesized arguments, enum literals unquoted.
    pub args: Vec<String>,
    pub unsigned: bool,
}

fn type_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// `'it''s'` → `it's`
fn quoted(input: &str) -> IResult<&str, String> {
    let (input, parts) = delimited(
        char('\''),
        many0(alt((
            map(is_not("'"), str::to_string),
            value("'".to_string(), tag("''")),
        ))),
        char('\''),
    )(input)?;
    Ok((input, parts.concat()))
}

fn bare_arg(input: &str) -> IResult<&str, String> {
    map(is_not(",)"), |s: &str| s.trim().to_string())(input)
}

fn type_args(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        char('('),
        separated_list0(char(','), preceded(multispace0, alt((quoted, bare_arg)))),
        char(')'),
    )(input)
}

/// Parse a `COLUMN_TYPE` string.
pub fn parse_column_type(raw: &str) -> Option<ColumnType> {
    let (rest, base) = type_name(raw.trim()).ok()?;
    let (rest, args) = opt(type_args)(rest).ok()?;
    let unsigned = rest
        .split_whitespace()
        .any(|modifier| modifier.eq_ignore_ascii_case("unsigned"));

    Some(ColumnType {
        base: base.to_ascii_lowercase(),
        args: args.unwrap_or_default(),
        unsigned,
    })
}

/// Map a parsed column type onto the canonical vocabulary.
pub fn map_type(column_type: &ColumnType) -> Option<DataType> {
    let data_type = match column_type.base.as_str() {
        "tinyint" if column_type.args == ["1"] => DataType::Boolean,
        "bool" | "boolean" => DataType::Boolean,
        "int" | "integer" | "smallint" => DataType::Integer,
        "bigint" => DataType::BigInteger,
        "tinyint" => DataType::Tinyint,
        "mediumint" => DataType::Mediumint,
        "float" => DataType::Float,
        "double" | "real" => DataType::Double,
        "decimal" | "numeric" => DataType::Decimal,
        "varchar" | "char" => DataType::String,
        "text" | "tinytext" | "mediumtext" | "longtext" => DataType::Text,
        "date" => DataType::Date,
        "datetime" => DataType::Datetime,
        "timestamp" => DataType::Timestamp,
        "time" => DataType::Time,
        "binary" | "varbinary" => DataType::Binary,
        "json" => DataType::Json,
        "enum" => DataType::Enum,
        _ => return None,
    };
    Some(data_type)
}

/// Normalize a `COLUMN_DEFAULT` value.
///
/// MariaDB quotes literal defaults and reports a missing one as `NULL`.
pub fn normalize_default(raw: Option<&str>, data_type: DataType) -> Option<DefaultValue> {
    let raw = raw?;
    if raw.eq_ignore_ascii_case("NULL") {
        return None;
    }
    let unquoted = match quoted(raw) {
        Ok(("", literal)) => literal,
        _ => raw.to_string(),
    };
    Some(typed_default(&unquoted, data_type))
}

static BACKTICK_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`']+)`").expect("valid regex"));
static REGEXP_ESCAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)\\'").expect("valid regex"));
static REGEXP_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)'").expect("valid regex"));
static NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([<>=!]{1,2})\s*(-?\d+)").expect("valid regex"));
static BETWEEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)between\s+(-?\d+)\s+and\s+(-?\d+)").expect("valid regex"));
static NOT_IN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnot\s+in\s*\(").expect("valid regex"));
static IN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bin\s*\(").expect("valid regex"));
static SIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(`[A-Za-z0-9_]+` ([<>]) 0\)").expect("valid regex"));

/// Every single-quoted literal of `clause`, backslashes removed.
pub fn quoted_values(clause: &str) -> Vec<String> {
    REGEXP_PLAIN
        .captures_iter(clause)
        .map(|caps| caps[1].replace('\\', ""))
        .collect()
}

fn parse_regexp(clause: &str) -> Option<String> {
    let caps = REGEXP_ESCAPED
        .captures(clause)
        .or_else(|| REGEXP_PLAIN.captures(clause))?;
    Some(caps[1].replace("\\\\\\\\", "\\").replace('\'', ""))
}

fn parse_numeral(clause: &str) -> Option<NumeralCheck> {
    let caps = NUMERAL.captures(clause)?;
    let operator = caps[1].parse().ok()?;
    let value = caps[2].parse().ok()?;
    Some(NumeralCheck::new(operator, value))
}

fn parse_between(clause: &str) -> Option<BetweenRange> {
    let pairs: Vec<(i64, i64)> = BETWEEN
        .captures_iter(clause)
        .filter_map(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
        .collect();
    BetweenRange::merged(&pairs)
}

/// Classify a MySQL `CHECK_CLAUSE`.
pub fn parse_check(clause: &str) -> ParsedCheck {
    let lower = clause.to_ascii_lowercase();

    let kind = if lower.contains("regexp_like") {
        parse_regexp(clause).map(CheckKind::Regexp)
    } else if lower.contains("length") {
        parse_numeral(clause).map(CheckKind::Numeral)
    } else if lower.contains("between") {
        parse_between(clause).map(CheckKind::Between)
    } else if NOT_IN.is_match(clause) {
        Some(CheckKind::NotIn(quoted_values(clause)))
    } else if IN.is_match(clause) {
        Some(CheckKind::In(quoted_values(clause)))
    } else if let Some(caps) = SIGN.captures(clause) {
        Some(if &caps[1] == ">" {
            CheckKind::Positive
        } else {
            CheckKind::Negative
        })
    } else {
        None
    };

    let column = BACKTICK_IDENT
        .captures(clause)
        .map(|caps| caps[1].to_string());

    ParsedCheck { column, kind }
}

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    column_name: String,
    column_type: String,
    column_default: Option<String>,
    character_maximum_length: Option<i64>,
    numeric_precision: Option<i64>,
    numeric_scale: Option<i64>,
    is_nullable: String,
    column_key: String,
    extra: String,
    collation_name: Option<String>,
    column_comment: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ConstraintRow {
    constraint_name: String,
    constraint_type: String,
    column_name: Option<String>,
    referenced_table: Option<String>,
    referenced_column: Option<String>,
    update_rule: Option<String>,
    delete_rule: Option<String>,
    check_clause: Option<String>,
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn column_from_row(table: &str, row: ColumnRow) -> Result<ColumnDefinition> {
    let column_type = parse_column_type(&row.column_type);
    let data_type = column_type
        .as_ref()
        .and_then(map_type)
        .ok_or_else(|| Error::unsupported_type(table, &row.column_name, &row.column_type))?;

    let mut column = ColumnDefinition::new(row.column_name, table, data_type);
    column.default_value = normalize_default(row.column_default.as_deref(), data_type);
    column.max_length = to_u32(row.character_maximum_length);
    column.numeric_precision = to_u32(row.numeric_precision);
    column.numeric_scale = to_u32(row.numeric_scale);
    column.is_nullable = row.is_nullable == "YES";
    column.is_unsigned = column_type.as_ref().is_some_and(|t| t.unsigned);
    column.is_unique = row.column_key == "UNI";
    column.is_primary_key = row.column_key == "PRI";
    column.has_auto_increment = row.extra.to_ascii_lowercase().contains("auto_increment");
    column.collation = row.collation_name;
    column.comment = non_empty(Some(row.column_comment));

    if data_type == DataType::Enum {
        column.enum_values = column_type.map(|t| t.args);
    }

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
        "CHECK" => Some(ConstraintKind::Check(parse_check(
            row.check_clause.as_deref().unwrap_or_default(),
        ))),
        _ => None,
    }
}

const LIST_TABLES: &str = "SELECT CAST(TABLE_NAME AS CHAR) \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_NAME";

const TABLE_EXISTS: &str = "SELECT CAST(TABLE_NAME AS CHAR) \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND TABLE_TYPE = 'BASE TABLE'";

const CONSTRAINTS: &str = "SELECT CAST(c.CONSTRAINT_NAME AS CHAR) AS constraint_name, \
            CAST(c.CONSTRAINT_TYPE AS CHAR) AS constraint_type, \
            CAST(k.COLUMN_NAME AS CHAR) AS column_name, \
            CAST(k.REFERENCED_TABLE_NAME AS CHAR) AS referenced_table, \
            CAST(k.REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column, \
            CAST(rc.UPDATE_RULE AS CHAR) AS update_rule, \
            CAST(rc.DELETE_RULE AS CHAR) AS delete_rule, \
            CAST(cc.CHECK_CLAUSE AS CHAR) AS check_clause \
     FROM information_schema.TABLE_CONSTRAINTS c \
     LEFT JOIN information_schema.KEY_COLUMN_USAGE k \
       ON k.CONSTRAINT_SCHEMA = c.CONSTRAINT_SCHEMA \
      AND k.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
      AND k.TABLE_NAME = c.TABLE_NAME \
     LEFT JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
       ON rc.CONSTRAINT_SCHEMA = c.CONSTRAINT_SCHEMA \
      AND rc.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
      AND rc.TABLE_NAME = c.TABLE_NAME \
     LEFT JOIN information_schema.CHECK_CONSTRAINTS cc \
       ON cc.CONSTRAINT_SCHEMA = c.CONSTRAINT_SCHEMA \
      AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
     WHERE c.TABLE_SCHEMA = ? AND c.TABLE_NAME = ? \
     ORDER BY c.CONSTRAINT_NAME, k.ORDINAL_POSITION";

const COLUMNS: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS column_name, \
            CAST(COLUMN_TYPE AS CHAR) AS column_type, \
            CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
            CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS character_maximum_length, \
            CAST(NUMERIC_PRECISION AS SIGNED) AS numeric_precision, \
            CAST(NUMERIC_SCALE AS SIGNED) AS numeric_scale, \
            CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
            CAST(COLUMN_KEY AS CHAR) AS column_key, \
            CAST(EXTRA AS CHAR) AS extra, \
            CAST(COLLATION_NAME AS CHAR) AS collation_name, \
            CAST(COLUMN_COMMENT AS CHAR) AS column_comment \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

/// Inspector over one MySQL database.
#[derive(Debug, Clone)]
pub struct MySqlInspector {
    pool: MySqlPool,
    database: String,
}

impl MySqlInspector {
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Inspector for MySqlInspector {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables = sqlx::query_scalar::<_, String>(LIST_TABLES)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await?;
        Ok(tables)
    }

    async fn table_info(&self, table: &str) -> Result<TableMetadata> {
        sqlx::query_scalar::<_, String>(TABLE_EXISTS)
            .bind(&self.database)
            .bind(table)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::MissingTable(table.to_string()))?;

        let mut meta = TableMetadata::new(table);

        let rows = sqlx::query_as::<_, ConstraintRow>(CONSTRAINTS)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let Some(kind) = constraint_kind(&row) else {
                log::debug!("ignoring {} constraint {}", row.constraint_type, row.constraint_name);
                continue;
            };
            meta.add_constraint_column(&row.constraint_name, kind, row.column_name, false);
        }

        Ok(meta)
    }

    async fn column_info(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let rows = sqlx::query_as::<_, ColumnRow>(COLUMNS)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| column_from_row(table, row))
            .collect()
    }
}
