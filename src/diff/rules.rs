//! Suppression rules for attribute changes that only reflect metadata
//! asymmetry between declaration and introspection.

use crate::schema::{
    AttributeValue, ColumnAttribute, ColumnDefinition, DataType, DefaultValue, Dialect,
    ReferentialAction,
};

use super::DiffKind;

/// An attribute change under consideration.
pub struct Change<'a> {
    pub old: &'a AttributeValue,
    pub new: &'a AttributeValue,
    /// The column on the target side.
    pub column: &'a ColumnDefinition,
    pub dialect: Dialect,
}

pub struct Suppression {
    pub attribute: ColumnAttribute,
    pub kind: DiffKind,
    pub applies: fn(&Change<'_>) -> bool,
}

pub const SUPPRESSIONS: &[Suppression] = &[
    Suppression {
        attribute: ColumnAttribute::NumericPrecision,
        kind: DiffKind::Modified,
        applies: |c| c.new.is_null(),
    },
    Suppression {
        attribute: ColumnAttribute::MaxLength,
        kind: DiffKind::Modified,
        applies: |c| c.dialect == Dialect::Mysql && c.new.is_null(),
    },
    // PostgreSQL has no unsigned integers.
    Suppression {
        attribute: ColumnAttribute::IsUnsigned,
        kind: DiffKind::Modified,
        applies: |c| c.dialect != Dialect::Mysql,
    },
    Suppression {
        attribute: ColumnAttribute::NumericPrecision,
        kind: DiffKind::Modified,
        applies: |c| c.column.data_type == DataType::Boolean,
    },
    Suppression {
        attribute: ColumnAttribute::NumericScale,
        kind: DiffKind::Modified,
        applies: |c| c.column.data_type == DataType::Boolean,
    },
    // Text defaults do not survive the round trip on either engine.
    Suppression {
        attribute: ColumnAttribute::DefaultValue,
        kind: DiffKind::Modified,
        applies: |c| c.column.data_type == DataType::Text,
    },
    // MySQL reports CURRENT_TIMESTAMP on timestamps declared without one.
    Suppression {
        attribute: ColumnAttribute::DefaultValue,
        kind: DiffKind::Modified,
        applies: |c| {
            c.dialect == Dialect::Mysql
                && c.column.data_type == DataType::Timestamp
                && c.new.is_null()
                && *c.old == AttributeValue::Default(DefaultValue::Now)
        },
    },
    Suppression {
        attribute: ColumnAttribute::Collation,
        kind: DiffKind::Deleted,
        applies: |_| true,
    },
    Suppression {
        attribute: ColumnAttribute::OnUpdate,
        kind: DiffKind::Deleted,
        applies: |c| {
            c.dialect == Dialect::Mysql
                && c.column.data_type == DataType::Integer
                && *c.old == AttributeValue::Action(ReferentialAction::Restrict)
        },
    },
];

/// Whether `change` of `attribute` should be left out of the diff.
pub fn is_suppressed(attribute: ColumnAttribute, kind: DiffKind, change: &Change<'_>) -> bool {
    SUPPRESSIONS
        .iter()
        .filter(|rule| rule.attribute == attribute && rule.kind == kind)
        .any(|rule| (rule.applies)(change))
}
