//! WHERE clause clean-up and auto-qualification.
//!
//! Only simple conjunctions are supported. Conjuncts are split on the
//! literal `AND` token without tracking parentheses, so `a BETWEEN 1 AND 2`
//! or `(a = 1 AND b = 2) OR c = 3` are split in the wrong place. Such inputs
//! are passed through in the permissive mode and rejected by
//! [`WhereSanitizer::sanitize_strict`].

use crate::columns::ColumnSet;
use crate::error::QueryError;

const TAUTOLOGIES: &[&str] = &["1=1", "true", "true=true", "0=0"];

/// Separators tried in order; the first that actually splits wins.
const AND_SEPARATORS: &[&str] = &[" AND ", " and ", " And "];

const SYMBOL_OPERATORS: &[&str] = &["!=", "<>", ">=", "<=", "=", ">", "<"];
const KEYWORD_OPERATORS: &[&str] = &["LIKE", "IN", "IS"];

const RESERVED: &[&str] = &[
    "and", "or", "not", "null", "true", "false", "is", "in", "like", "between", "exists",
    "select", "case", "when", "then", "else", "end", "where", "from", "as", "on", "distinct",
    "all", "any", "some", "cast", "interval",
];

/// Sanitize without a whitelist. An empty `owner_table` disables qualification.
#[must_use]
pub fn sanitize(expr: &str, owner_table: &str) -> String {
    WhereSanitizer::new(owner_table).sanitize(expr)
}

#[derive(Clone, Copy, Debug)]
pub struct WhereSanitizer<'a> {
    owner: &'a str,
    whitelist: Option<&'a ColumnSet>,
}

impl<'a> WhereSanitizer<'a> {
    #[must_use]
    pub fn new(owner_table: &'a str) -> Self {
        Self {
            owner: owner_table.trim(),
            whitelist: None,
        }
    }

    /// Only qualify identifiers present in `columns`.
    #[must_use]
    pub fn whitelist(mut self, columns: &'a ColumnSet) -> Self {
        self.whitelist = Some(columns);
        self
    }

    /// Strip redundant parentheses, drop tautologies and qualify bare
    /// column references. Returns `""` when nothing is left.
    #[must_use]
    pub fn sanitize(&self, expr: &str) -> String {
        self.conjuncts(expr)
            .into_iter()
            .map(|c| self.qualify(c))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Like [`Self::sanitize`], but refuses conjuncts that cannot be
    /// qualified safely: top-level `OR`, unbalanced parentheses left by the
    /// naive splitter, or no extractable column identifier.
    ///
    /// # Errors
    /// `QueryError::UnqualifiableWhere` with the offending conjunct.
    pub fn sanitize_strict(&self, expr: &str) -> Result<String, QueryError> {
        let mut out = Vec::new();
        for conjunct in self.conjuncts(expr) {
            if !self.owner.is_empty()
                && !is_qualified(conjunct)
                && (is_complex(conjunct) || column_identifier(conjunct).is_none())
            {
                return Err(QueryError::UnqualifiableWhere(conjunct.to_owned()));
            }
            out.push(self.qualify(conjunct));
        }
        Ok(out.join(" AND "))
    }

    fn conjuncts<'e>(&self, expr: &'e str) -> Vec<&'e str> {
        let body = strip_outer_parens(expr);
        split_conjuncts(body)
            .into_iter()
            .map(strip_outer_parens)
            .filter(|c| !c.is_empty() && !is_tautology(c))
            .collect()
    }

    fn qualify(&self, conjunct: &str) -> String {
        if self.owner.is_empty() || is_qualified(conjunct) {
            return conjunct.to_owned();
        }
        let Some(ident) = column_identifier(conjunct) else {
            return conjunct.to_owned();
        };
        if let Some(set) = self.whitelist
            && !set.contains(ident)
        {
            return conjunct.to_owned();
        }
        format!("{}.{conjunct}", self.owner)
    }
}

/// Repeatedly remove one pair of outer parentheses while that pair encloses
/// the whole expression.
#[must_use]
pub fn strip_outer_parens(expr: &str) -> &str {
    let mut s = expr.trim();
    while s.starts_with('(') && s.ends_with(')') && encloses_all(s) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

/// True when the opening parenthesis at 0 closes at the last character.
fn encloses_all(s: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote = false;
    let last = s.len() - 1;
    for (i, ch) in s.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }
    false
}

/// Split on the first separator that yields more than one piece.
#[must_use]
pub fn split_conjuncts(expr: &str) -> Vec<&str> {
    for sep in AND_SEPARATORS {
        let parts: Vec<&str> = expr.split(sep).collect();
        if parts.len() > 1 {
            return parts;
        }
    }
    vec![expr]
}

/// Always-true literal forms, compared ignoring case, outer parentheses and
/// whitespace around `=`. Whitespace inside a token (`t r u e`) does not match.
#[must_use]
pub fn is_tautology(conjunct: &str) -> bool {
    let normalized = strip_outer_parens(conjunct)
        .to_ascii_lowercase()
        .split('=')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("=");
    TAUTOLOGIES.contains(&normalized.as_str())
}

fn is_qualified(conjunct: &str) -> bool {
    let head = leading_token(conjunct);
    head.contains('.')
}

/// Text up to the first symbol, parenthesis or whitespace.
fn leading_token(conjunct: &str) -> &str {
    let end = conjunct
        .find(|c: char| c.is_whitespace() || "=!<>(".contains(c))
        .unwrap_or(conjunct.len());
    &conjunct[..end]
}

/// Candidate column identifier of a conjunct: the text before the first
/// comparison operator, or else the first whitespace token.
#[must_use]
pub fn column_identifier(conjunct: &str) -> Option<&str> {
    let conjunct = conjunct.trim();
    let before_op = first_operator(conjunct).map(|idx| conjunct[..idx].trim());
    let candidate = match before_op {
        Some(c) if is_identifier(c) => c,
        _ => conjunct.split_whitespace().next()?,
    };
    if !is_identifier(candidate) || RESERVED.iter().any(|r| r.eq_ignore_ascii_case(candidate)) {
        return None;
    }
    Some(candidate)
}

fn first_operator(conjunct: &str) -> Option<usize> {
    let symbols = SYMBOL_OPERATORS.iter().filter_map(|op| conjunct.find(op));
    let upper = conjunct.to_ascii_uppercase();
    let keywords = KEYWORD_OPERATORS
        .iter()
        .filter_map(|kw| find_keyword(&upper, kw));
    symbols.chain(keywords).min()
}

/// Position of `kw` as a whole word in an uppercased string.
fn find_keyword(upper: &str, kw: &str) -> Option<usize> {
    let bytes = upper.as_bytes();
    let mut from = 0;
    while let Some(rel) = upper[from..].find(kw) {
        let start = from + rel;
        let end = start + kw.len();
        let before_ok = start == 0 || !is_ident_byte(bytes[start - 1]);
        let after_ok = end == bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Top-level `OR` or unbalanced parentheses.
fn is_complex(conjunct: &str) -> bool {
    let mut depth = 0i32;
    let mut in_quote = false;
    let upper = conjunct.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            b'O' if !in_quote && depth == 0 && upper[i..].starts_with("OR") => {
                let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
                let after_ok = i + 2 == bytes.len() || !is_ident_byte(bytes[i + 2]);
                if before_ok && after_ok {
                    return true;
                }
            }
            _ => {}
        }
    }
    depth != 0
}
