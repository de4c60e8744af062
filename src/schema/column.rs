//! Column definitions and their attribute walk.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::check::{BetweenRange, NumeralCheck};

/// Dialect-neutral column type, named after the knex builder method that
/// creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Integer,
    #[serde(alias = "bigint")]
    BigInteger,
    Tinyint,
    Mediumint,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    Text,
    Date,
    Datetime,
    Timestamp,
    Time,
    Binary,
    Json,
    Jsonb,
    Uuid,
    Enum,
}

impl DataType {
    /// The knex `table.<method>()` used to declare a column of this type.
    pub fn knex_method(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::BigInteger => "bigInteger",
            DataType::Tinyint => "tinyint",
            DataType::Mediumint => "mediumint",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::Text => "text",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
            DataType::Timestamp => "timestamp",
            DataType::Time => "time",
            DataType::Binary => "binary",
            DataType::Json => "json",
            DataType::Jsonb => "jsonb",
            DataType::Uuid => "uuid",
            DataType::Enum => "enum",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::BigInteger | DataType::Tinyint | DataType::Mediumint
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::Datetime | DataType::Timestamp | DataType::Time
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.knex_method())
    }
}

/// Column default.
///
/// `Now` stands for any "current timestamp/date" server expression and is
/// written as the string `"NOW"` in snapshots.
///
/// Numbers compare by value: a declared `0` equals an inspected `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawDefault", into = "RawDefault")]
pub enum DefaultValue {
    Now,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        use DefaultValue::*;
        match (self, other) {
            (Now, Now) => true,
            (Text(a), Text(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Integer(i), Float(f)) | (Float(f), Integer(i)) => *i as f64 == *f,
            (Boolean(a), Boolean(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDefault {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

pub const NOW_SENTINEL: &str = "NOW";

impl From<RawDefault> for DefaultValue {
    fn from(raw: RawDefault) -> Self {
        match raw {
            RawDefault::Boolean(b) => DefaultValue::Boolean(b),
            RawDefault::Integer(i) => DefaultValue::Integer(i),
            RawDefault::Float(f) => DefaultValue::Float(f),
            RawDefault::Text(s) if s == NOW_SENTINEL => DefaultValue::Now,
            RawDefault::Text(s) => DefaultValue::Text(s),
        }
    }
}

impl From<DefaultValue> for RawDefault {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Now => RawDefault::Text(NOW_SENTINEL.to_string()),
            DefaultValue::Text(s) => RawDefault::Text(s),
            DefaultValue::Integer(i) => RawDefault::Integer(i),
            DefaultValue::Float(f) => RawDefault::Float(f),
            DefaultValue::Boolean(b) => RawDefault::Boolean(b),
        }
    }
}

/// Foreign key `ON UPDATE` / `ON DELETE` behaviour.
///
/// `NO ACTION` has no variant: it is the engines' implicit behaviour and is
/// treated as "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    #[serde(rename = "RESTRICT")]
    Restrict,
}

impl ReferentialAction {
    /// Map a catalog `UPDATE_RULE`/`DELETE_RULE` value.
    pub fn from_rule(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
        }
    }
}

/// Check predicates attached to a column, each with an optional custom
/// constraint name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnChecks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_not_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_between: Option<BetweenRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_regexp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_numeral: Option<NumeralCheck>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub check_positive: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub check_negative: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_not_in_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_between_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_regexp_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_numeral_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_positive_custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_negative_custom: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn yes() -> bool {
    true
}

/// A single column of a canonical snapshot.
///
/// The first block of fields is always present on a column, even when the
/// value is null. Every field after `has_auto_increment` only exists when
/// set; the diff treats a missing one as "absent", not as "null".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(default)]
    pub table: String,
    pub data_type: DataType,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub numeric_precision: Option<u32>,
    #[serde(default)]
    pub numeric_scale: Option<u32>,
    #[serde(default = "yes")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unsigned: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub has_auto_increment: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "binaryUuid", default, skip_serializing_if = "is_false")]
    pub binary_uuid: bool,
    #[serde(rename = "useTz", default, skip_serializing_if = "is_false")]
    pub use_tz: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_column: Option<String>,
    #[serde(rename = "onUpdate", default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(rename = "onDelete", default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(rename = "constraintDeferred", default, skip_serializing_if = "is_false")]
    pub constraint_deferred: bool,
    #[serde(flatten)]
    pub checks: ColumnChecks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Every attribute the differ knows about, in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAttribute {
    Name,
    Table,
    DataType,
    DefaultValue,
    MaxLength,
    NumericPrecision,
    NumericScale,
    IsNullable,
    IsUnsigned,
    IsUnique,
    IsPrimaryKey,
    HasAutoIncrement,
    EnumValues,
    BinaryUuid,
    UseTz,
    ForeignKeyTable,
    ForeignKeyColumn,
    OnUpdate,
    OnDelete,
    ConstraintDeferred,
    CheckIn,
    CheckNotIn,
    CheckBetween,
    CheckRegexp,
    CheckNumeral,
    CheckPositive,
    CheckNegative,
    CheckInCustom,
    CheckNotInCustom,
    CheckBetweenCustom,
    CheckRegexpCustom,
    CheckNumeralCustom,
    CheckPositiveCustom,
    CheckNegativeCustom,
    Collation,
    Comment,
}

impl fmt::Display for ColumnAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        f.write_str(&name)
    }
}

/// Value carried by one column attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    DataType(DataType),
    Default(DefaultValue),
    Action(ReferentialAction),
    List(Vec<String>),
    Between(BetweenRange),
    Numeral(NumeralCheck),
}

impl AttributeValue {
    fn text(value: &Option<String>) -> Self {
        value.clone().map_or(AttributeValue::Null, AttributeValue::Text)
    }

    fn number(value: Option<u32>) -> Self {
        value.map_or(AttributeValue::Null, |n| AttributeValue::Integer(i64::from(n)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl ColumnDefinition {
    /// A nullable column with every other attribute unset.
    pub fn new(name: impl Into<String>, table: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            data_type,
            default_value: None,
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: true,
            is_unsigned: false,
            is_unique: false,
            is_primary_key: false,
            has_auto_increment: false,
            enum_values: None,
            binary_uuid: false,
            use_tz: false,
            foreign_key_table: None,
            foreign_key_column: None,
            on_update: None,
            on_delete: None,
            constraint_deferred: false,
            checks: ColumnChecks::default(),
            collation: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn increments(mut self) -> Self {
        self.has_auto_increment = true;
        self.is_nullable = false;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = scale;
        self
    }

    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key_table = Some(table.into());
        self.foreign_key_column = Some(column.into());
        self
    }

    /// The attributes present on this column, in walk order.
    pub fn attributes(&self) -> Vec<(ColumnAttribute, AttributeValue)> {
        use AttributeValue as V;
        use ColumnAttribute as A;

        let mut attrs = vec![
            (A::Name, V::Text(self.name.clone())),
            (A::Table, V::Text(self.table.clone())),
            (A::DataType, V::DataType(self.data_type)),
            (
                A::DefaultValue,
                self.default_value.clone().map_or(V::Null, V::Default),
            ),
            (A::MaxLength, V::number(self.max_length)),
            (A::NumericPrecision, V::number(self.numeric_precision)),
            (A::NumericScale, V::number(self.numeric_scale)),
            (A::IsNullable, V::Bool(self.is_nullable)),
            (A::IsUnsigned, V::Bool(self.is_unsigned)),
            (A::IsUnique, V::Bool(self.is_unique)),
            (A::IsPrimaryKey, V::Bool(self.is_primary_key)),
            (A::HasAutoIncrement, V::Bool(self.has_auto_increment)),
        ];

        let mut optional = |attr: ColumnAttribute, value: Option<AttributeValue>| {
            if let Some(value) = value {
                attrs.push((attr, value));
            }
        };
        let flag = |set: bool| set.then_some(V::Bool(true));
        let named = |name: &Option<String>| name.as_ref().map(|_| V::text(name));
        let checks = &self.checks;

        optional(A::EnumValues, self.enum_values.clone().map(V::List));
        optional(A::BinaryUuid, flag(self.binary_uuid));
        optional(A::UseTz, flag(self.use_tz));
        optional(A::ForeignKeyTable, named(&self.foreign_key_table));
        optional(A::ForeignKeyColumn, named(&self.foreign_key_column));
        optional(A::OnUpdate, self.on_update.map(V::Action));
        optional(A::OnDelete, self.on_delete.map(V::Action));
        optional(A::ConstraintDeferred, flag(self.constraint_deferred));
        optional(A::CheckIn, checks.check_in.clone().map(V::List));
        optional(A::CheckNotIn, checks.check_not_in.clone().map(V::List));
        optional(A::CheckBetween, checks.check_between.clone().map(V::Between));
        optional(A::CheckRegexp, named(&checks.check_regexp));
        optional(A::CheckNumeral, checks.check_numeral.map(V::Numeral));
        optional(A::CheckPositive, flag(checks.check_positive));
        optional(A::CheckNegative, flag(checks.check_negative));
        optional(A::CheckInCustom, named(&checks.check_in_custom));
        optional(A::CheckNotInCustom, named(&checks.check_not_in_custom));
        optional(A::CheckBetweenCustom, named(&checks.check_between_custom));
        optional(A::CheckRegexpCustom, named(&checks.check_regexp_custom));
        optional(A::CheckNumeralCustom, named(&checks.check_numeral_custom));
        optional(A::CheckPositiveCustom, named(&checks.check_positive_custom));
        optional(A::CheckNegativeCustom, named(&checks.check_negative_custom));
        optional(A::Collation, named(&self.collation));
        optional(A::Comment, named(&self.comment));

        attrs
    }
}
