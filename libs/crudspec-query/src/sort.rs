//! Normalization of client sort entries.
//!
//! Clients send sort columns in several shapes: `created_at`, `-created_at`,
//! `posts.created_at desc`, `author.name asc nulls last`. [`SortSpec`] splits
//! such an entry into relation prefix, bare column, effective direction and
//! null ordering. A marker embedded in the column text wins over the explicit
//! `direction` field of the [`SortOption`].

use crate::{SortDir, SortOption};

/// JSON navigation operators (`data->'a'`, `data->>'a'`).
pub const JSON_NAV_OPERATOR: &str = "->";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

/// A sort entry with markers stripped and the direction resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    /// Relation (or table) prefix, when the column was dotted.
    pub relation: Option<String>,
    /// Bare column name, or the full JSON navigation expression.
    pub column: String,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

impl SortSpec {
    /// Normalize a request sort entry.
    #[must_use]
    pub fn parse(option: &SortOption) -> Self {
        let mut raw = option.column.trim();
        let mut nulls = None;
        let mut embedded = None;

        // Markers may appear in either order: "col desc nulls last" is the usual one.
        loop {
            if let Some(rest) = strip_suffix_ci(raw, " nulls last") {
                nulls = Some(NullsOrder::Last);
                raw = rest.trim_end();
            } else if let Some(rest) = strip_suffix_ci(raw, " nulls first") {
                nulls = Some(NullsOrder::First);
                raw = rest.trim_end();
            } else if let Some(rest) = strip_suffix_ci(raw, " desc") {
                embedded.get_or_insert(SortDir::Desc);
                raw = rest.trim_end();
            } else if let Some(rest) = strip_suffix_ci(raw, " asc") {
                embedded.get_or_insert(SortDir::Asc);
                raw = rest.trim_end();
            } else {
                break;
            }
        }

        if let Some(rest) = raw.strip_prefix('-') {
            embedded.get_or_insert(SortDir::Desc);
            raw = rest.trim_start();
        } else if let Some(rest) = raw.strip_prefix('+') {
            embedded.get_or_insert(SortDir::Asc);
            raw = rest.trim_start();
        }

        let (relation, column) = split_relation(raw);

        Self {
            relation,
            column,
            dir: embedded.unwrap_or(option.direction),
            nulls,
        }
    }

    /// True when the column is a JSON navigation expression.
    #[must_use]
    pub fn is_json_path(&self) -> bool {
        self.column.contains(JSON_NAV_OPERATOR)
    }

    /// The dotted form the client would have written, without markers.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.relation {
            Some(rel) => format!("{rel}.{}", self.column),
            None => self.column.clone(),
        }
    }
}

/// Split `rel.col` into its parts. Only the text before a JSON navigation
/// operator is inspected, so dots inside JSON keys are left alone.
fn split_relation(raw: &str) -> (Option<String>, String) {
    let head_end = raw.find(JSON_NAV_OPERATOR).unwrap_or(raw.len());
    let head = &raw[..head_end];
    match head.rfind('.') {
        Some(dot) if dot > 0 => (
            Some(raw[..dot].trim().to_owned()),
            raw[dot + 1..].trim().to_owned(),
        ),
        _ => (None, raw.to_owned()),
    }
}

/// A plain SQL identifier: ASCII letter or underscore, then letters, digits
/// or underscores.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a column at its first JSON navigation operator:
/// `meta->>'plan'` gives `("meta", "->>'plan'")`.
#[must_use]
pub fn split_json_path(column: &str) -> Option<(&str, &str)> {
    column
        .find(JSON_NAV_OPERATOR)
        .map(|idx| (column[..idx].trim_end(), &column[idx..]))
}

/// True when `path` is one or more `->`/`->>` steps, each followed by a
/// single-quoted key or an array index.
///
/// Keys are limited to letters, digits, spaces and `_ - . : @`, so a key can
/// never close its quote, escape it, or carry a placeholder.
#[must_use]
pub fn is_valid_json_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let mut rest = path;
    while !rest.is_empty() {
        let Some(step) = rest.strip_prefix(JSON_NAV_OPERATOR) else {
            return false;
        };
        let step = step.strip_prefix('>').unwrap_or(step);
        match json_step(step) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    true
}

/// A bare or dotted identifier, optionally followed by a well-formed JSON path.
#[must_use]
pub fn is_column_reference(column: &str) -> bool {
    let (head, path) = match split_json_path(column) {
        Some((head, path)) => (head, Some(path)),
        None => (column, None),
    };
    path.is_none_or(is_valid_json_path) && head.split('.').all(is_identifier)
}

/// One key or index; returns what follows it.
fn json_step(s: &str) -> Option<&str> {
    if let Some(quoted) = s.strip_prefix('\'') {
        let end = quoted.find('\'')?;
        quoted[..end]
            .chars()
            .all(is_json_key_char)
            .then(|| &quoted[end + 1..])
    } else {
        let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        (end > 0).then(|| &s[end..])
    }
}

fn is_json_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ' | ':' | '@')
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() || !s.is_char_boundary(s.len() - suffix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(s.len() - suffix.len());
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}
