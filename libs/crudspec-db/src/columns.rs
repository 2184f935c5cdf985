//! Column whitelisting.
//!
//! A [`ColumnSet`] is the lowercase set of physical column names of one
//! model. [`ColumnValidator`] checks request column references against it,
//! either failing on the first bad request or dropping bad items with a
//! warning.

use std::collections::{BTreeMap, HashSet};

use crudspec_query::sort::{is_identifier, is_valid_json_path, split_json_path};
use crudspec_query::{FilterOption, QueryOptions, SortOption, SortSpec};

use crate::error::{FieldError, QueryError};
use crate::model::{ModelEntry, ModelMeta};

/// Default prefix of request-computed column aliases.
pub const DEFAULT_COMPUTED_PREFIX: &str = "cql";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSet {
    names: HashSet<String>,
}

impl ColumnSet {
    #[must_use]
    pub fn from_meta(meta: &ModelMeta) -> Self {
        Self::from_names(meta.column_names())
    }

    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }

    /// A whitelisted name, or a whitelisted base followed by a well-formed
    /// JSON navigation path.
    #[must_use]
    pub fn accepts(&self, column: &str) -> bool {
        match split_json_path(column) {
            Some((base, path)) => is_valid_json_path(path) && self.contains(base),
            None => self.contains(column),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// How validation failures are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Any invalid reference fails the whole request.
    FailFast,
    /// Invalid references are dropped with a warning.
    #[default]
    FilterAndWarn,
}

/// Validates column references of a request against one model.
#[derive(Clone, Debug)]
pub struct ColumnValidator<'a> {
    table: &'a str,
    columns: &'a ColumnSet,
    computed_prefix: &'a str,
    aliases: Vec<&'a str>,
    relations: BTreeMap<String, &'a ColumnSet>,
}

impl<'a> ColumnValidator<'a> {
    #[must_use]
    pub fn new(table: &'a str, columns: &'a ColumnSet) -> Self {
        Self {
            table,
            columns,
            computed_prefix: DEFAULT_COMPUTED_PREFIX,
            aliases: Vec::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Validator for a registered model: its columns, static computed
    /// aliases and relation column sets.
    #[must_use]
    pub fn for_entry(entry: &'a ModelEntry) -> Self {
        let mut v = Self::new(entry.table(), &entry.columns);
        v.aliases = entry.computed.iter().map(|c| c.name.as_str()).collect();
        for rel in &entry.relations {
            v = v.with_relation(&rel.name, &rel.columns);
        }
        v
    }

    #[must_use]
    pub fn computed_prefix(mut self, prefix: &'a str) -> Self {
        self.computed_prefix = prefix;
        self
    }

    #[must_use]
    pub fn with_relation(mut self, name: &str, columns: &'a ColumnSet) -> Self {
        self.relations.insert(name.to_lowercase(), columns);
        self
    }

    /// True for the empty name, computed aliases, and whitelisted columns.
    /// JSON navigation needs a whitelisted base and a well-formed path.
    #[must_use]
    pub fn validate(&self, column: &str) -> bool {
        let column = column.trim();
        if column.is_empty() || self.is_computed(column) {
            return true;
        }

        let column = match column.split_once('.') {
            Some((qualifier, rest)) if qualifier.eq_ignore_ascii_case(self.table) => rest,
            _ => column,
        };
        self.columns.accepts(column)
    }

    /// Prefixed names count only when they are plain identifiers.
    fn is_computed(&self, column: &str) -> bool {
        let prefix = self.computed_prefix;
        let has_prefix = !prefix.is_empty()
            && is_identifier(column)
            && column.len() >= prefix.len()
            && column.is_char_boundary(prefix.len())
            && column[..prefix.len()].eq_ignore_ascii_case(prefix);
        has_prefix || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(column))
    }

    /// A sort entry is valid when its column is. Entries prefixed with another
    /// relation need that relation registered and the column in its set.
    #[must_use]
    pub fn validate_sort(&self, sort: &SortOption) -> bool {
        let spec = SortSpec::parse(sort);
        match spec.relation.as_deref() {
            Some(rel) if !rel.eq_ignore_ascii_case(self.table) => self
                .relations
                .get(&rel.to_lowercase())
                .is_some_and(|columns| columns.accepts(&spec.column)),
            _ => self.validate(&spec.column),
        }
    }

    /// Keep valid names, warn about the rest.
    #[must_use]
    pub fn filter_valid(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| self.keep(c, "column"))
            .cloned()
            .collect()
    }

    fn keep(&self, column: &str, what: &'static str) -> bool {
        if self.validate(column) {
            return true;
        }
        let err = FieldError::InvalidColumn(column.to_owned());
        tracing::warn!(table = %self.table, kind = what, error = %err, "dropping invalid column reference");
        false
    }

    /// Every invalid column reference in the request, in request order.
    #[must_use]
    pub fn invalid_columns(&self, options: &QueryOptions) -> Vec<String> {
        let mut bad = Vec::new();
        self.collect_invalid(
            &options.columns,
            &options.omit_columns,
            &options.filters,
            &options.sort,
            &mut bad,
        );
        for preload in &options.preload {
            match self.relation_validator(&preload.relation) {
                Some(rel) => rel.collect_invalid(
                    &preload.columns,
                    &preload.omit_columns,
                    &preload.filters,
                    &preload.sort,
                    &mut bad,
                ),
                None => tracing::debug!(
                    relation = %preload.relation,
                    "no column set for preload relation; skipping validation"
                ),
            }
        }
        bad
    }

    fn collect_invalid(
        &self,
        columns: &[String],
        omit: &[String],
        filters: &[FilterOption],
        sort: &[SortOption],
        bad: &mut Vec<String>,
    ) {
        let mut push = |name: &str| {
            if !bad.iter().any(|b| b == name) {
                bad.push(name.to_owned());
            }
        };
        for c in columns.iter().chain(omit) {
            if !self.validate(c) {
                push(c);
            }
        }
        for f in filters {
            if !self.validate(&f.column) {
                push(&f.column);
            }
        }
        for s in sort {
            if !self.validate_sort(s) {
                push(&s.column);
            }
        }
    }

    /// Fail with the full list of offending names if any reference is invalid.
    ///
    /// # Errors
    /// `QueryError::InvalidColumns` listing every invalid name.
    pub fn validate_all(&self, options: &QueryOptions) -> Result<(), QueryError> {
        let bad = self.invalid_columns(options);
        if bad.is_empty() {
            Ok(())
        } else {
            Err(QueryError::InvalidColumns(bad))
        }
    }

    /// Apply a validation mode to a request.
    ///
    /// # Errors
    /// In `FailFast` mode, `QueryError::InvalidColumns` when anything is invalid.
    pub fn apply(
        &self,
        mut options: QueryOptions,
        mode: ValidationMode,
    ) -> Result<QueryOptions, QueryError> {
        match mode {
            ValidationMode::FailFast => {
                self.validate_all(&options)?;
                Ok(options)
            }
            ValidationMode::FilterAndWarn => {
                self.retain_valid(
                    &mut options.columns,
                    &mut options.omit_columns,
                    &mut options.filters,
                    &mut options.sort,
                );
                for preload in &mut options.preload {
                    if let Some(rel) = self.relation_validator(&preload.relation) {
                        rel.retain_valid(
                            &mut preload.columns,
                            &mut preload.omit_columns,
                            &mut preload.filters,
                            &mut preload.sort,
                        );
                    }
                }
                Ok(options)
            }
        }
    }

    fn retain_valid(
        &self,
        columns: &mut Vec<String>,
        omit: &mut Vec<String>,
        filters: &mut Vec<FilterOption>,
        sort: &mut Vec<SortOption>,
    ) {
        columns.retain(|c| self.keep(c, "column"));
        omit.retain(|c| self.keep(c, "omit"));
        filters.retain(|f| self.keep(&f.column, "filter"));
        sort.retain(|s| {
            if self.validate_sort(s) {
                return true;
            }
            let err = FieldError::InvalidSortColumn(s.column.clone());
            tracing::warn!(table = %self.table, error = %err, "dropping invalid sort entry");
            false
        });
    }

    fn relation_validator<'b>(&'b self, relation: &'b str) -> Option<ColumnValidator<'b>> {
        let columns = self.relations.get(&relation.to_lowercase())?;
        Some(ColumnValidator {
            table: relation,
            columns,
            computed_prefix: self.computed_prefix,
            aliases: Vec::new(),
            relations: BTreeMap::new(),
        })
    }
}
