//! Request-size caps applied before compilation.
//!
//! - Maximum `limit`
//! - Maximum number of sort entries
//! - Maximum number of filters
//! - Maximum length of a raw WHERE expression

use crate::{Error, QueryOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLimits {
    /// Maximum accepted `limit` (default: 1000)
    pub max_limit: u64,
    /// Maximum number of sort entries (default: 5)
    pub max_sort_fields: usize,
    /// Maximum number of filters, preload filters included (default: 50)
    pub max_filters: usize,
    /// Maximum length of a raw WHERE expression in bytes (default: 2000)
    pub max_where_length: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_limit: 1000,
            max_sort_fields: 5,
            max_filters: 50,
            max_where_length: 2000,
        }
    }
}

impl QueryLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_limit(mut self, max: u64) -> Self {
        self.max_limit = max;
        self
    }

    #[must_use]
    pub fn with_max_sort_fields(mut self, max: usize) -> Self {
        self.max_sort_fields = max;
        self
    }

    #[must_use]
    pub fn with_max_filters(mut self, max: usize) -> Self {
        self.max_filters = max;
        self
    }

    #[must_use]
    pub fn with_max_where_length(mut self, max: usize) -> Self {
        self.max_where_length = max;
        self
    }

    /// # Errors
    /// `Error::InvalidLimit` when `limit` is zero or above the cap.
    pub fn validate_limit(&self, limit: u64) -> Result<(), Error> {
        if limit == 0 || limit > self.max_limit {
            return Err(Error::InvalidLimit);
        }
        Ok(())
    }

    /// # Errors
    /// `Error::TooManySortFields` when the count exceeds the cap.
    pub fn validate_sort_count(&self, count: usize) -> Result<(), Error> {
        if count > self.max_sort_fields {
            return Err(Error::TooManySortFields(self.max_sort_fields));
        }
        Ok(())
    }

    /// # Errors
    /// `Error::TooManyFilters` when the count exceeds the cap.
    pub fn validate_filter_count(&self, count: usize) -> Result<(), Error> {
        if count > self.max_filters {
            return Err(Error::TooManyFilters(self.max_filters));
        }
        Ok(())
    }

    /// # Errors
    /// `Error::WhereTooLong` when the expression exceeds the cap.
    pub fn validate_where(&self, expr: &str) -> Result<(), Error> {
        if expr.len() > self.max_where_length {
            return Err(Error::WhereTooLong(self.max_where_length));
        }
        Ok(())
    }

    /// Run every shape check against a request.
    ///
    /// # Errors
    /// The first violated cap, or `Error::CursorConflict` when both cursor
    /// tokens are set.
    pub fn validate(&self, options: &QueryOptions) -> Result<(), Error> {
        if let Some(limit) = options.limit {
            self.validate_limit(limit)?;
        }
        self.validate_sort_count(options.sort.len())?;
        let filters = options.filters.len()
            + options
                .preload
                .iter()
                .map(|p| p.filters.len())
                .sum::<usize>();
        self.validate_filter_count(filters)?;
        options.cursor()?;
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{FilterOption, PreloadOption, SortOption};

    #[test]
    fn test_default_limits() {
        let limits = QueryLimits::default();
        assert_eq!(limits.max_limit, 1000);
        assert_eq!(limits.max_sort_fields, 5);
        assert_eq!(limits.max_filters, 50);
        assert_eq!(limits.max_where_length, 2000);
    }

    #[test]
    fn test_validate_limit_bounds() {
        let limits = QueryLimits::default();
        assert!(limits.validate_limit(1).is_ok());
        assert!(limits.validate_limit(1000).is_ok());
        assert_eq!(limits.validate_limit(0), Err(Error::InvalidLimit));
        assert_eq!(limits.validate_limit(1001), Err(Error::InvalidLimit));
    }

    #[test]
    fn test_validate_where_too_long() {
        let limits = QueryLimits::new().with_max_where_length(10);
        assert!(limits.validate_where("a = 1").is_ok());
        assert_eq!(
            limits.validate_where("status = 'active'"),
            Err(Error::WhereTooLong(10))
        );
    }

    #[test]
    fn test_preload_filters_count_towards_cap() {
        let limits = QueryLimits::new().with_max_filters(2);
        let mut q = QueryOptions::new()
            .filter(FilterOption::new("a", "eq", 1.into()))
            .filter(FilterOption::new("b", "eq", 2.into()));
        assert!(limits.validate(&q).is_ok());

        q.preload.push(PreloadOption {
            relation: "posts".to_owned(),
            filters: vec![FilterOption::new("c", "eq", 3.into())],
            ..PreloadOption::default()
        });
        assert_eq!(limits.validate(&q), Err(Error::TooManyFilters(2)));
    }

    #[test]
    fn test_validate_rejects_too_many_sorts() {
        let limits = QueryLimits::new().with_max_sort_fields(1);
        let q = QueryOptions::new()
            .sort_by(SortOption::asc("a"))
            .sort_by(SortOption::desc("b"));
        assert_eq!(limits.validate(&q), Err(Error::TooManySortFields(1)));
    }
}
