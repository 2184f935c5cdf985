#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Structured CRUD request model.
//!
//! This crate describes *what* a client asked for (columns, filters, sorts,
//! pagination) in a transport-independent shape. It never produces SQL; the
//! compilation into parameterized fragments lives in `crudspec_db`.

pub mod limits;
pub mod operator;
pub mod options;
pub mod sort;

pub use limits::QueryLimits;
pub use operator::{FilterOperator, LogicOperator};
pub use options::{
    ComputedColumn, CursorDirection, FilterOption, PreloadOption, QueryOptions, SortOption,
};
pub use sort::{NullsOrder, SortSpec};

// Ordering primitives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[default]
    #[serde(rename = "asc", alias = "ASC", alias = "Asc")]
    Asc,
    #[serde(rename = "desc", alias = "DESC", alias = "Desc")]
    Desc,
}

impl SortDir {
    /// Reverse the sort direction (Asc <-> Desc)
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    /// SQL keyword for this direction.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDir {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "+" => Ok(SortDir::Asc),
            "desc" | "-" => Ok(SortDir::Desc),
            other => Err(Error::InvalidSortDirection(other.to_owned())),
        }
    }
}

impl std::fmt::Display for SortDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDir::Asc => write!(f, "asc"),
            SortDir::Desc => write!(f, "desc"),
        }
    }
}

/// Unified error type for request-shape problems.
///
/// These are raised before any SQL is produced and always describe a client
/// input error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid sort direction: {0}")]
    InvalidSortDirection(String),

    #[error("both cursor_forward and cursor_backward are set")]
    CursorConflict,

    #[error("INVALID_LIMIT")]
    InvalidLimit,

    #[error("too many sort fields (max: {0})")]
    TooManySortFields(usize),

    #[error("too many filters (max: {0})")]
    TooManyFilters(usize),

    #[error("where clause exceeds maximum length of {0} characters")]
    WhereTooLong(usize),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
