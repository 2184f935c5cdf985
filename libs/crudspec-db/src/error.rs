//! Error taxonomy of the compiler.
//!
//! [`QueryError`] aborts the operation and is always a client input problem.
//! [`FieldError`] describes one bad item (a column, a range, a join); callers
//! log it and continue without that item.

use crudspec_query::FilterOperator;
use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("cursor pagination requires cursor_forward or cursor_backward")]
    CursorTokenMissing,

    #[error("cursor_forward and cursor_backward are mutually exclusive")]
    CursorTokenConflict,

    #[error("cursor pagination requires at least one sort column")]
    EmptySort,

    #[error("no valid sort columns after filtering")]
    NoValidSortColumns,

    #[error("where clause cannot be safely qualified: {0}")]
    UnqualifiableWhere(String),

    #[error("invalid columns: {}", .0.join(", "))]
    InvalidColumns(Vec<String>),

    #[error(transparent)]
    Request(#[from] crudspec_query::Error),
}

impl QueryError {
    /// HTTP status an API layer should answer with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            QueryError::InvalidColumns(_)
            | QueryError::NoValidSortColumns
            | QueryError::UnqualifiableWhere(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::CursorTokenMissing
            | QueryError::CursorTokenConflict
            | QueryError::EmptySort
            | QueryError::Request(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::CursorTokenMissing => "crudspec.cursor.missing_token",
            QueryError::CursorTokenConflict => "crudspec.cursor.token_conflict",
            QueryError::EmptySort => "crudspec.cursor.empty_sort",
            QueryError::NoValidSortColumns => "crudspec.cursor.no_valid_sort",
            QueryError::UnqualifiableWhere(_) => "crudspec.where.unqualifiable",
            QueryError::InvalidColumns(_) => "crudspec.columns.invalid",
            QueryError::Request(_) => "crudspec.request.invalid",
        }
    }
}

/// A problem with a single item of the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid column: {0}")]
    InvalidColumn(String),

    #[error("{operator} on {column} requires exactly 2 values, got {got}")]
    BetweenArity {
        column: String,
        operator: FilterOperator,
        got: usize,
    },

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("invalid sort column: {0}")]
    InvalidSortColumn(String),

    #[error("no join definition for relation {relation} (column {column})")]
    MissingJoin { relation: String, column: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to extract crudspec configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("invalid limits: default {default} exceeds max {max}")]
    InvalidLimits { default: u64, max: u64 },

    #[error("computed column prefix must not be empty")]
    EmptyComputedPrefix,

    #[error("cursor alias must be a plain identifier, got '{0}'")]
    InvalidCursorAlias(String),
}
