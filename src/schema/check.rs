//! Structured check-constraint payloads.
//!
//! Both engines store check constraints as free SQL text. The inspectors
//! turn that text into one of the [`CheckKind`] predicates below, and the
//! declaration layer produces the same shapes directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Comparison operator of a length check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "<>",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(ComparisonOperator::Eq),
            // engines echo `!=` back as `<>`
            "<>" | "!=" => Ok(ComparisonOperator::Ne),
            "<" => Ok(ComparisonOperator::Lt),
            "<=" => Ok(ComparisonOperator::Le),
            ">" => Ok(ComparisonOperator::Gt),
            ">=" => Ok(ComparisonOperator::Ge),
            other => Err(format!("unknown comparison operator `{}`", other)),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `length(column) <op> <value>` predicate.
///
/// Serialized as `"<op> <value>"`, e.g. `"> 3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NumeralCheck {
    pub operator: ComparisonOperator,
    pub value: i64,
}

impl NumeralCheck {
    pub fn new(operator: ComparisonOperator, value: i64) -> Self {
        Self { operator, value }
    }
}

impl TryFrom<String> for NumeralCheck {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let mut parts = raw.split_whitespace();
        let operator = parts
            .next()
            .ok_or_else(|| format!("empty numeral check `{}`", raw))?
            .parse()?;
        let value = parts
            .next()
            .ok_or_else(|| format!("numeral check `{}` has no value", raw))?
            .parse::<i64>()
            .map_err(|e| format!("numeral check `{}`: {}", raw, e))?;
        Ok(Self { operator, value })
    }
}

impl From<NumeralCheck> for String {
    fn from(check: NumeralCheck) -> Self {
        check.to_string()
    }
}

impl fmt::Display for NumeralCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.value)
    }
}

/// Value range(s) of a `BETWEEN` check.
///
/// A single range serializes as `[min, max]`, several disjoint ranges as
/// `[[min, max], ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BetweenRange {
    Single(i64, i64),
    Multiple(Vec<(i64, i64)>),
}

impl BetweenRange {
    /// Merge consecutive ranges whose bounds touch (`next.min == max + 1`).
    ///
    /// Returns `None` when no range was given.
    pub fn merged(pairs: &[(i64, i64)]) -> Option<Self> {
        let mut ranges: Vec<(i64, i64)> = Vec::new();
        for &(start, end) in pairs {
            match ranges.last_mut() {
                Some(current) if start == current.1 + 1 => current.1 = end,
                _ => ranges.push((start, end)),
            }
        }

        match ranges.len() {
            0 => None,
            1 => Some(BetweenRange::Single(ranges[0].0, ranges[0].1)),
            _ => Some(BetweenRange::Multiple(ranges)),
        }
    }

    pub fn ranges(&self) -> Vec<(i64, i64)> {
        match self {
            BetweenRange::Single(min, max) => vec![(*min, *max)],
            BetweenRange::Multiple(ranges) => ranges.clone(),
        }
    }
}

/// Classified check predicate, as recovered from a catalog clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    Regexp(String),
    Numeral(NumeralCheck),
    Between(BetweenRange),
    In(Vec<String>),
    NotIn(Vec<String>),
    Positive,
    Negative,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_ranges_merge() {
        let merged = BetweenRange::merged(&[(1, 3), (4, 10)]);
        assert_eq!(merged, Some(BetweenRange::Single(1, 10)));
    }

    #[test]
    fn test_disjoint_ranges_stay_apart() {
        let merged = BetweenRange::merged(&[(1, 3), (5, 9)]);
        assert_eq!(merged, Some(BetweenRange::Multiple(vec![(1, 3), (5, 9)])));
    }

    #[test]
    fn test_merge_chain_then_gap() {
        let merged = BetweenRange::merged(&[(1, 2), (3, 4), (5, 6), (10, 12)]);
        assert_eq!(merged, Some(BetweenRange::Multiple(vec![(1, 6), (10, 12)])));
        assert_eq!(BetweenRange::merged(&[]), None);
    }

    #[test]
    fn test_between_json_shapes() {
        let single: BetweenRange = serde_json::from_str("[1, 10]").unwrap();
        assert_eq!(single, BetweenRange::Single(1, 10));

        let multiple: BetweenRange = serde_json::from_str("[[1, 3], [5, 9]]").unwrap();
        assert_eq!(multiple, BetweenRange::Multiple(vec![(1, 3), (5, 9)]));
        assert_eq!(serde_json::to_string(&multiple).unwrap(), "[[1,3],[5,9]]");
    }

    #[test]
    fn test_numeral_not_equal_normalizes() {
        let check: NumeralCheck = serde_json::from_str("\"!= 4\"").unwrap();
        assert_eq!(check.operator, ComparisonOperator::Ne);
        assert_eq!(check.to_string(), "<> 4");
    }

    #[test]
    fn test_numeral_rejects_garbage() {
        assert!(NumeralCheck::try_from("~ 4".to_string()).is_err());
        assert!(NumeralCheck::try_from(">".to_string()).is_err());
    }
}
