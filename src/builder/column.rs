//! Knex column builder chains.

use crate::schema::{BetweenRange, ColumnDefinition, DataType, DefaultValue, Dialect, NOW_SENTINEL};

/// Quote `value` as a single-quoted JS string literal.
pub fn js_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn js_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| js_string(v)).collect();
    format!("[{}]", items.join(", "))
}

fn js_ranges(range: &BetweenRange) -> String {
    match range {
        BetweenRange::Single(min, max) => format!("[{}, {}]", min, max),
        BetweenRange::Multiple(ranges) => {
            let pairs: Vec<String> = ranges
                .iter()
                .map(|(min, max)| format!("[{}, {}]", min, max))
                .collect();
            format!("[{}]", pairs.join(", "))
        }
    }
}

/// Optional custom constraint name argument.
fn custom(name: &Option<String>) -> String {
    name.as_ref()
        .map(|n| format!(", {}", js_string(n)))
        .unwrap_or_default()
}

fn custom_only(name: &Option<String>) -> String {
    name.as_deref().map(js_string).unwrap_or_default()
}

/// The `<type>('<name>', ...)` call that opens a column chain.
///
/// PostgreSQL timestamps are zoned unless `useTz: false` is passed.
pub fn initializer(column: &ColumnDefinition, table: &str, dialect: Dialect) -> String {
    let method = if column.has_auto_increment {
        "increments"
    } else {
        column.data_type.knex_method()
    };
    let mut call = format!("{}({}", method, js_string(&column.name));

    if column.has_auto_increment {
        call.push(')');
        return call;
    }

    match column.data_type {
        DataType::String | DataType::Integer | DataType::Tinyint | DataType::Binary => {
            if let Some(length) = column.max_length {
                // 255 is knex's implicit string length
                if !(column.data_type == DataType::String && length == 255) {
                    call.push_str(&format!(", {}", length));
                }
            }
        }
        DataType::Float | DataType::Double | DataType::Decimal => {
            if let Some(precision) = column.numeric_precision {
                call.push_str(&format!(", {}", precision));
                if let Some(scale) = column.numeric_scale {
                    call.push_str(&format!(", {}", scale));
                }
            }
        }
        DataType::Datetime | DataType::Timestamp if column.use_tz => {
            call.push_str(", { useTz: true }");
        }
        DataType::Datetime | DataType::Timestamp if dialect == Dialect::Postgres => {
            call.push_str(", { useTz: false }");
        }
        DataType::Enum => {
            if let Some(values) = &column.enum_values {
                let table = if column.table.is_empty() { table } else { &column.table };
                call.push_str(&format!(
                    ", {}, {{ useNative: true, enumName: {} }}",
                    js_list(values),
                    js_string(&format!("{}_{}", table, column.name))
                ));
            }
        }
        DataType::Uuid if column.binary_uuid => {
            call.push_str(", { binaryUuid: true }");
        }
        _ => {}
    }

    call.push(')');
    call
}

fn default_expression(column: &ColumnDefinition, value: &DefaultValue, dialect: Dialect) -> String {
    match value {
        DefaultValue::Now if !column.data_type.is_temporal() => js_string(NOW_SENTINEL),
        DefaultValue::Now => {
            let date_only = matches!(column.data_type, DataType::Date | DataType::Time);
            if date_only && dialect != Dialect::Postgres {
                "knex.raw('(CURRENT_DATE())')".to_string()
            } else {
                "knex.fn.now()".to_string()
            }
        }
        DefaultValue::Text(text) => js_string(text),
        DefaultValue::Integer(i) => i.to_string(),
        DefaultValue::Float(f) => f.to_string(),
        DefaultValue::Boolean(b) => b.to_string(),
    }
}

/// Full builder statement for `column`, one line without indentation.
///
/// `alter` appends the `.alter()` marker used when re-declaring an
/// existing column.
pub fn chain(column: &ColumnDefinition, table: &str, dialect: Dialect, alter: bool) -> String {
    let mut line = format!("table.{}", initializer(column, table, dialect));

    if column.is_unsigned {
        line.push_str(".unsigned()");
    }
    if column.is_nullable {
        line.push_str(".nullable()");
    } else {
        line.push_str(".notNullable()");
    }
    if column.is_primary_key {
        line.push_str(".primary()");
    }
    if column.is_unique {
        line.push_str(".unique()");
    }
    if let Some(value) = &column.default_value {
        line.push_str(&format!(".defaultTo({})", default_expression(column, value, dialect)));
    }
    if let (Some(table), Some(key)) = (&column.foreign_key_table, &column.foreign_key_column) {
        line.push_str(&format!(
            ".references({}).inTable({})",
            js_string(key),
            js_string(table)
        ));
    }
    if let Some(action) = column.on_update {
        line.push_str(&format!(".onUpdate({})", js_string(action.as_str())));
    }
    if let Some(action) = column.on_delete {
        line.push_str(&format!(".onDelete({})", js_string(action.as_str())));
    }
    if column.constraint_deferred {
        line.push_str(".deferrable()");
    }

    let checks = &column.checks;
    if let Some(values) = &checks.check_in {
        line.push_str(&format!(".checkIn({}{})", js_list(values), custom(&checks.check_in_custom)));
    }
    if let Some(values) = &checks.check_not_in {
        line.push_str(&format!(
            ".checkNotIn({}{})",
            js_list(values),
            custom(&checks.check_not_in_custom)
        ));
    }
    if let Some(range) = &checks.check_between {
        line.push_str(&format!(
            ".checkBetween({}{})",
            js_ranges(range),
            custom(&checks.check_between_custom)
        ));
    }
    if let Some(pattern) = &checks.check_regexp {
        line.push_str(&format!(
            ".checkRegex({}{})",
            js_string(pattern),
            custom(&checks.check_regexp_custom)
        ));
    }
    if let Some(numeral) = &checks.check_numeral {
        line.push_str(&format!(
            ".checkLength({}, {}{})",
            js_string(numeral.operator.as_str()),
            numeral.value,
            custom(&checks.check_numeral_custom)
        ));
    }
    if checks.check_positive {
        line.push_str(&format!(".checkPositive({})", custom_only(&checks.check_positive_custom)));
    }
    if checks.check_negative {
        line.push_str(&format!(".checkNegative({})", custom_only(&checks.check_negative_custom)));
    }

    if let Some(comment) = &column.comment {
        line.push_str(&format!(".comment({})", js_string(comment)));
    }
    if alter {
        line.push_str(".alter()");
    }

    line
}

pub fn drop_column(name: &str) -> String {
    format!("table.dropColumn({})", js_string(name))
}
