use serde::{Deserialize, Serialize};

use crate::{Error, FilterOperator, LogicOperator, SortDir};

/// One structured filter: `column <operator> value`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    pub column: String,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Scalar for most operators, a two-element array for the between
    /// operators and an array for `in`.
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, alias = "logic")]
    pub logic_operator: LogicOperator,
}

impl FilterOption {
    #[must_use]
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<FilterOperator>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value,
            logic_operator: LogicOperator::And,
        }
    }

    /// Join this filter with OR instead of AND.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.logic_operator = LogicOperator::Or;
        self
    }
}

/// One sort entry. `column` may carry a relation prefix and an embedded
/// direction marker, see [`crate::SortSpec`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub column: String,
    #[serde(default)]
    pub direction: SortDir,
}

impl SortOption {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDir::Asc,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDir::Desc,
        }
    }
}

/// A relation to load alongside the main rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadOption {
    pub relation: String,
    pub columns: Vec<String>,
    pub omit_columns: Vec<String>,
    pub filters: Vec<FilterOption>,
    pub sort: Vec<SortOption>,
}

/// A named SQL expression supplied by the request (`cql_*` aliases).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedColumn {
    pub name: String,
    pub expression: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorDirection {
    Forward,
    Backward,
}

/// The complete structured request.
///
/// Insertion order of `filters` and `sort` is significant: filters chain in
/// order and sorts define tie-break priority.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub columns: Vec<String>,
    pub omit_columns: Vec<String>,
    pub filters: Vec<FilterOption>,
    pub sort: Vec<SortOption>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub cursor_forward: Option<String>,
    pub cursor_backward: Option<String>,
    pub preload: Vec<PreloadOption>,
    pub computed: Vec<ComputedColumn>,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterOption) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, sort: SortOption) -> Self {
        self.sort.push(sort);
        self
    }

    #[must_use]
    pub fn after(mut self, token: impl Into<String>) -> Self {
        self.cursor_forward = Some(token.into());
        self
    }

    #[must_use]
    pub fn before(mut self, token: impl Into<String>) -> Self {
        self.cursor_backward = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resolve which cursor (if any) this request carries.
    ///
    /// Blank tokens count as absent.
    ///
    /// # Errors
    /// Returns `Error::CursorConflict` when both tokens are present.
    pub fn cursor(&self) -> Result<Option<(CursorDirection, &str)>, Error> {
        let fwd = non_blank(self.cursor_forward.as_deref());
        let bwd = non_blank(self.cursor_backward.as_deref());
        match (fwd, bwd) {
            (Some(_), Some(_)) => Err(Error::CursorConflict),
            (Some(t), None) => Ok(Some((CursorDirection::Forward, t))),
            (None, Some(t)) => Ok(Some((CursorDirection::Backward, t))),
            (None, None) => Ok(None),
        }
    }

    /// True when at least one cursor token is set.
    #[must_use]
    pub fn has_cursor(&self) -> bool {
        non_blank(self.cursor_forward.as_deref()).is_some()
            || non_blank(self.cursor_backward.as_deref()).is_some()
    }

    /// Drop blank and duplicate selected columns, keeping first occurrence order.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.columns = dedup_columns(self.columns);
        self.omit_columns = dedup_columns(self.omit_columns);
        for preload in &mut self.preload {
            preload.columns = dedup_columns(std::mem::take(&mut preload.columns));
        }
        self
    }
}

fn non_blank(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}

fn dedup_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(columns.len());
    let mut out = Vec::with_capacity(columns.len());
    for col in columns {
        let trimmed = col.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_owned());
    }
    out
}
