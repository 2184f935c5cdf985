use std::fmt;
use std::str::FromStr;

use sea_orm::DbBackend;
use serde::{Deserialize, Serialize};

/// SQL flavour used when rendering a [`crate::Predicate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `?` placeholders, list parameters kept as one placeholder.
    #[default]
    Generic,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    Sqlite,
}

impl Dialect {
    /// Whether `ILIKE` is understood natively.
    #[must_use]
    pub fn supports_ilike(self) -> bool {
        matches!(self, Dialect::Generic | Dialect::Postgres)
    }

    /// Whether list parameters are expanded into one placeholder per element.
    #[must_use]
    pub fn expands_lists(self) -> bool {
        !matches!(self, Dialect::Generic)
    }

    /// Wrap a column expression in a cast to text.
    #[must_use]
    pub fn text_cast(self, expr: &str) -> String {
        match self {
            Dialect::Postgres if is_plain_reference(expr) => format!("{expr}::text"),
            Dialect::Postgres => format!("({expr})::text"),
            Dialect::MySql => format!("CAST({expr} AS CHAR)"),
            Dialect::Generic | Dialect::Sqlite => format!("CAST({expr} AS TEXT)"),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

fn is_plain_reference(expr: &str) -> bool {
    expr.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

impl From<DbBackend> for Dialect {
    fn from(backend: DbBackend) -> Self {
        match backend {
            DbBackend::Postgres => Dialect::Postgres,
            DbBackend::MySql => Dialect::MySql,
            DbBackend::Sqlite => Dialect::Sqlite,
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Dialect::Generic),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
