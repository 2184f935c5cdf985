//! Named SQL expressions usable as columns.
//!
//! Static expressions come from the model registration. Request expressions
//! are accepted only when enabled in the configuration and when their name
//! carries the computed prefix.

use std::borrow::Cow;

use crudspec_query::ComputedColumn;
use regex::{NoExpand, Regex};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComputedColumns {
    columns: Vec<ComputedColumn>,
    /// Indexes of columns that came from the request.
    requested: Vec<usize>,
}

impl ComputedColumns {
    #[must_use]
    pub fn new(registered: &[ComputedColumn]) -> Self {
        Self {
            columns: registered.to_vec(),
            requested: Vec::new(),
        }
    }

    /// Add request expressions. A request expression is dropped with a
    /// warning unless request expressions are enabled and its name is a
    /// plain, unused identifier starting with `prefix`.
    #[must_use]
    pub fn with_request(mut self, request: &[ComputedColumn], prefix: &str, allowed: bool) -> Self {
        for col in request {
            let reason = if !allowed {
                Some("request expressions are disabled")
            } else if !has_prefix(&col.name, prefix) {
                Some("name lacks the computed prefix")
            } else if !is_plain_name(&col.name) || col.expression.trim().is_empty() {
                Some("malformed computed column")
            } else if self.position(&col.name).is_some() {
                Some("name is already taken")
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::warn!(name = %col.name, reason, "dropping request computed column");
                continue;
            }
            self.requested.push(self.columns.len());
            self.columns.push(col.clone());
        }
        self
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComputedColumn> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    /// Columns sent with the request, in request order.
    pub fn requested(&self) -> impl Iterator<Item = &ComputedColumn> {
        self.requested.iter().map(|&idx| &self.columns[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComputedColumn> {
        self.columns.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// `(expr) AS name` select item.
#[must_use]
pub fn select_expr(column: &ComputedColumn) -> String {
    format!("({}) AS {}", column.expression.trim(), column.name)
}

/// Rewrite `table.` references of an expression to `alias.` so it reads the
/// anchor row of a cursor subquery.
#[must_use]
pub fn anchor_expr<'e>(expression: &'e str, table: &str, alias: &str) -> Cow<'e, str> {
    replace_qualifier(expression, table, alias)
}

/// Replace the `from.` qualifier by `to.` on word boundaries.
pub(crate) fn replace_qualifier<'s>(sql: &'s str, from: &str, to: &str) -> Cow<'s, str> {
    if from.is_empty() {
        return Cow::Borrowed(sql);
    }
    match Regex::new(&format!(r"\b{}\.", regex::escape(from))) {
        Ok(re) => re.replace_all(sql, NoExpand(&format!("{to}."))),
        Err(err) => {
            tracing::warn!(qualifier = %from, error = %err, "cannot build qualifier pattern");
            Cow::Borrowed(sql)
        }
    }
}

fn has_prefix(name: &str, prefix: &str) -> bool {
    let name = name.trim();
    !prefix.is_empty()
        && name.len() >= prefix.len()
        && name.is_char_boundary(prefix.len())
        && name[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn col(name: &str, expr: &str) -> ComputedColumn {
        ComputedColumn {
            name: name.to_owned(),
            expression: expr.to_owned(),
        }
    }

    #[test]
    fn request_expressions_need_opt_in_and_prefix() {
        let registered = [col("word_count", "length(posts.body)")];
        let request = [col("cql_score", "posts.likes * 2"), col("score", "1")];

        let off = ComputedColumns::new(&registered).with_request(&request, "cql", false);
        assert!(off.get("cql_score").is_none());
        assert_eq!(off.requested().count(), 0);

        let on = ComputedColumns::new(&registered).with_request(&request, "cql", true);
        assert!(on.get("CQL_SCORE").is_some());
        assert!(on.get("score").is_none());
        assert!(on.get("word_count").is_some());
        assert_eq!(on.requested().count(), 1);
    }

    #[test]
    fn select_item_is_parenthesized() {
        assert_eq!(select_expr(&col("cql_total", " a + b ")), "(a + b) AS cql_total");
    }

    #[test]
    fn anchor_rewrite_respects_word_boundaries() {
        assert_eq!(
            anchor_expr("posts.likes + my_posts.likes", "posts", "cursor_select"),
            "cursor_select.likes + my_posts.likes"
        );
    }
}
