//! Default-value normalization shared by both inspectors.

use crate::schema::{DataType, DefaultValue};

/// Whether `raw` is a server-side "current date/time" expression such as
/// `CURRENT_TIMESTAMP`, `CURRENT_TIMESTAMP(3)`, `now()` or `curdate()`.
pub fn is_current_time_expression(raw: &str) -> bool {
    let upper = raw.trim().to_ascii_uppercase();
    let name = match upper.find('(') {
        Some(open) if upper.ends_with(')') => &upper[..open],
        Some(_) => return false,
        None => upper.as_str(),
    };
    matches!(
        name.trim(),
        "CURRENT_TIMESTAMP"
            | "NOW"
            | "CURDATE"
            | "CURRENT_DATE"
            | "CURTIME"
            | "CURRENT_TIME"
            | "LOCALTIMESTAMP"
            | "LOCALTIME"
    )
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "b'1'" => Some(true),
        "0" | "false" | "f" | "b'0'" => Some(false),
        _ => None,
    }
}

/// Turn an engine default (already stripped of quotes and casts) into a
/// typed default for a column of `data_type`.
pub fn typed_default(raw: &str, data_type: DataType) -> DefaultValue {
    if data_type.is_temporal() && is_current_time_expression(raw) {
        return DefaultValue::Now;
    }

    let parsed = match data_type {
        DataType::Boolean => parse_bool(raw).map(DefaultValue::Boolean),
        t if t.is_integer() => raw.trim().parse().ok().map(DefaultValue::Integer),
        DataType::Float | DataType::Double | DataType::Decimal => {
            raw.trim().parse().ok().map(DefaultValue::Float)
        }
        _ => None,
    };

    parsed.unwrap_or_else(|| DefaultValue::Text(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_expressions() {
        assert!(is_current_time_expression("CURRENT_TIMESTAMP"));
        assert!(is_current_time_expression("current_timestamp(6)"));
        assert!(is_current_time_expression("now()"));
        assert!(is_current_time_expression("curdate()"));
        assert!(!is_current_time_expression("2024-01-01"));
        assert!(!is_current_time_expression("now() + interval"));
    }

    #[test]
    fn test_sentinel_only_on_temporal_columns() {
        assert_eq!(typed_default("CURRENT_TIMESTAMP", DataType::Timestamp), DefaultValue::Now);
        assert_eq!(typed_default("curdate()", DataType::Date), DefaultValue::Now);
        assert_eq!(
            typed_default("CURRENT_TIMESTAMP", DataType::String),
            DefaultValue::Text("CURRENT_TIMESTAMP".into())
        );
    }

    #[test]
    fn test_typed_literals() {
        assert_eq!(typed_default("42", DataType::Integer), DefaultValue::Integer(42));
        assert_eq!(typed_default("-7", DataType::BigInteger), DefaultValue::Integer(-7));
        assert_eq!(typed_default("1", DataType::Boolean), DefaultValue::Boolean(true));
        assert_eq!(typed_default("false", DataType::Boolean), DefaultValue::Boolean(false));
        assert_eq!(typed_default("2.50", DataType::Decimal), DefaultValue::Float(2.5));
        assert_eq!(typed_default("draft", DataType::String), DefaultValue::Text("draft".into()));
        assert_eq!(typed_default("abc", DataType::Integer), DefaultValue::Text("abc".into()));
    }
}
