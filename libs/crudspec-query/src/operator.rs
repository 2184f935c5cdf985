//! Filter and logic operators as they arrive from clients.
//!
//! Operator names are matched case-insensitively and accept the common
//! aliases (`=`, `ne`, `>=`, `isnull`, ...). Names that match nothing are kept
//! verbatim in [`FilterOperator::Other`] so the compiler can degrade them to
//! equality instead of rejecting the request.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Comparison operator of a single filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    #[default]
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    Between,
    BetweenInclusive,
    IsNull,
    IsNotNull,
    /// Unrecognized operator name, preserved for diagnostics.
    Other(String),
}

impl FilterOperator {
    /// Parse an operator name. Never fails; unknown names become `Other`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" | "==" | "equals" => FilterOperator::Eq,
            "neq" | "ne" | "!=" | "<>" | "not_equals" => FilterOperator::Neq,
            "gt" | ">" | "greater_than" => FilterOperator::Gt,
            "gte" | "ge" | ">=" | "greater_than_equals" => FilterOperator::Gte,
            "lt" | "<" | "less_than" => FilterOperator::Lt,
            "lte" | "le" | "<=" | "less_than_equals" => FilterOperator::Lte,
            "like" => FilterOperator::Like,
            "ilike" => FilterOperator::ILike,
            "in" => FilterOperator::In,
            "between" => FilterOperator::Between,
            "between_inclusive" | "betweeninclusive" => FilterOperator::BetweenInclusive,
            "is_null" | "isnull" | "null" => FilterOperator::IsNull,
            "is_not_null" | "isnotnull" | "notnull" | "not_null" => FilterOperator::IsNotNull,
            _ => FilterOperator::Other(name.to_owned()),
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::ILike => "ilike",
            FilterOperator::In => "in",
            FilterOperator::Between => "between",
            FilterOperator::BetweenInclusive => "between_inclusive",
            FilterOperator::IsNull => "is_null",
            FilterOperator::IsNotNull => "is_not_null",
            FilterOperator::Other(name) => name,
        }
    }

    /// Operators that ignore the filter value entirely.
    #[must_use]
    pub fn is_nullary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FilterOperator {
    fn from(value: &str) -> Self {
        FilterOperator::parse(value)
    }
}

impl Serialize for FilterOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilterOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FilterOperator::parse(&raw))
    }
}

/// How a filter joins the predicates accumulated before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
        }
    }
}

impl Serialize for LogicOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_sql())
    }
}

impl<'de> Deserialize<'de> for LogicOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Anything that is not an explicit OR keeps the AND default.
        if raw.trim().eq_ignore_ascii_case("or") {
            Ok(LogicOperator::Or)
        } else {
            Ok(LogicOperator::And)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!(FilterOperator::parse("EQ"), FilterOperator::Eq);
        assert_eq!(FilterOperator::parse("<>"), FilterOperator::Neq);
        assert_eq!(FilterOperator::parse(">="), FilterOperator::Gte);
        assert_eq!(FilterOperator::parse("ILike"), FilterOperator::ILike);
        assert_eq!(
            FilterOperator::parse("between_inclusive"),
            FilterOperator::BetweenInclusive
        );
        assert_eq!(FilterOperator::parse("isnull"), FilterOperator::IsNull);
    }

    #[test]
    fn unknown_names_are_preserved() {
        let op = FilterOperator::parse("contains_all");
        assert_eq!(op, FilterOperator::Other("contains_all".to_owned()));
        assert_eq!(op.to_string(), "contains_all");
    }

    #[test]
    fn logic_operator_defaults_to_and() {
        let or: LogicOperator = serde_json::from_str("\"Or\"").unwrap();
        let junk: LogicOperator = serde_json::from_str("\"xor\"").unwrap();
        assert_eq!(or, LogicOperator::Or);
        assert_eq!(junk, LogicOperator::And);
    }
}
