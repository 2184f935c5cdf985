//! Keyset pagination.
//!
//! The cursor token is the primary key of the anchor row. The filter is a
//! correlated subquery that loads the anchor under a reserved alias and
//! compares it with the outer row over the sort columns:
//!
//! ```sql
//! EXISTS (SELECT 1 FROM posts cursor_select
//!         WHERE cursor_select.id = 42
//!           AND ((cursor_select.created_at < posts.created_at)
//!             OR (cursor_select.created_at = posts.created_at AND cursor_select.id < posts.id)))
//! ```
//!
//! Backward traversal flips every direction. Columns of joined relations are
//! read through a copy of the relation's join, rewritten to the anchor alias.

use std::sync::LazyLock;

use crudspec_query::sort::is_column_reference;
use crudspec_query::{CursorDirection, QueryOptions, SortDir, SortSpec};
use regex::{Captures, Regex};

use crate::columns::ColumnSet;
use crate::computed::{ComputedColumns, anchor_expr, replace_qualifier};
use crate::config::{DEFAULT_CURSOR_ALIAS, KeysetMode};
use crate::error::{FieldError, QueryError};
use crate::model::FieldKind;
use crate::predicate::Predicate;

#[allow(clippy::expect_used)] // good regex, it doesn't panic
static JOIN_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bJOIN\s+)([A-Za-z_][\w.]*)(\s+AS)?(\s+)([A-Za-z_]\w*)")
        .expect("static regex should not panic")
});

/// Join SQL of a relation, keyed by the alias the relation is joined under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinDef {
    pub alias: String,
    pub sql: String,
}

impl JoinDef {
    #[must_use]
    pub fn new(alias: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            sql: sql.into(),
        }
    }

    /// Copy of the join for the anchor subquery: the relation alias becomes
    /// `<cursor_alias>_<alias>` and `table.` references become `cursor_alias.`.
    #[must_use]
    pub fn rewrite_for_cursor(&self, table: &str, cursor_alias: &str) -> String {
        let scoped = self.scoped_alias(cursor_alias);
        let sql = replace_qualifier(&self.sql, &self.alias, &scoped);
        let sql = replace_qualifier(&sql, table, cursor_alias);
        JOIN_DECL
            .replace_all(&sql, |caps: &Captures<'_>| {
                let head = format!("{}{}", &caps[1], &caps[2]);
                let word = &caps[5];
                if word.eq_ignore_ascii_case("on") || word.eq_ignore_ascii_case("using") {
                    // No alias declared; the joined table itself goes by the relation name.
                    if caps[2].eq_ignore_ascii_case(&self.alias) {
                        return format!("{head} {scoped}{}{word}", &caps[4]);
                    }
                } else if word.eq_ignore_ascii_case(&self.alias) {
                    let as_kw = caps.get(3).map_or("", |m| m.as_str());
                    return format!("{head}{as_kw}{}{scoped}", &caps[4]);
                }
                caps[0].to_owned()
            })
            .into_owned()
    }

    fn scoped_alias(&self, cursor_alias: &str) -> String {
        format!("{cursor_alias}_{}", self.alias)
    }
}

/// One resolved sort column: anchor-side and target-side expressions.
#[derive(Debug)]
struct KeyColumn {
    anchor: String,
    target: String,
    dir: SortDir,
}

impl KeyColumn {
    fn strict(&self) -> String {
        let op = match self.dir {
            SortDir::Asc => "<",
            SortDir::Desc => ">",
        };
        format!("{} {op} {}", self.anchor, self.target)
    }

    fn equal(&self) -> String {
        format!("{} = {}", self.anchor, self.target)
    }
}

struct Resolved {
    anchor: String,
    target: String,
    join: Option<(String, String)>,
}

/// Builder of the cursor EXISTS predicate for one table.
#[derive(Clone, Copy, Debug)]
pub struct CursorFilter<'a> {
    table: &'a str,
    primary_key: &'a str,
    primary_key_kind: Option<FieldKind>,
    known_columns: Option<&'a ColumnSet>,
    relation_columns: &'a [(&'a str, &'a ColumnSet)],
    joins: &'a [JoinDef],
    computed: Option<&'a ComputedColumns>,
    alias: &'a str,
    mode: KeysetMode,
}

impl<'a> CursorFilter<'a> {
    #[must_use]
    pub fn new(table: &'a str, primary_key: &'a str) -> Self {
        Self {
            table,
            primary_key,
            primary_key_kind: None,
            known_columns: None,
            relation_columns: &[],
            joins: &[],
            computed: None,
            alias: DEFAULT_CURSOR_ALIAS,
            mode: KeysetMode::default(),
        }
    }

    /// Declared type of the primary key. The token is inlined only for
    /// integer keys (or when the type is unknown) and bound otherwise.
    #[must_use]
    pub fn primary_key_kind(mut self, kind: FieldKind) -> Self {
        self.primary_key_kind = Some(kind);
        self
    }

    /// Restrict owner columns to this set. Without it any well-formed owner
    /// column reference is accepted.
    #[must_use]
    pub fn known_columns(mut self, columns: &'a ColumnSet) -> Self {
        self.known_columns = Some(columns);
        self
    }

    /// Column sets of joined relations, by relation name. A relation listed
    /// here only accepts its own columns.
    #[must_use]
    pub fn relation_columns(mut self, sets: &'a [(&'a str, &'a ColumnSet)]) -> Self {
        self.relation_columns = sets;
        self
    }

    #[must_use]
    pub fn joins(mut self, joins: &'a [JoinDef]) -> Self {
        self.joins = joins;
        self
    }

    #[must_use]
    pub fn computed(mut self, computed: &'a ComputedColumns) -> Self {
        self.computed = Some(computed);
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: &'a str) -> Self {
        self.alias = alias;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: KeysetMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the EXISTS predicate for the request's cursor.
    ///
    /// Sort entries that cannot be resolved are skipped with a warning.
    ///
    /// # Errors
    /// - `QueryError::CursorTokenMissing` / `CursorTokenConflict` unless exactly one token is set
    /// - `QueryError::EmptySort` when there is nothing to order by
    /// - `QueryError::NoValidSortColumns` when every sort entry was skipped
    pub fn build(&self, options: &QueryOptions) -> Result<Predicate, QueryError> {
        let (direction, token) = options
            .cursor()
            .map_err(|_| QueryError::CursorTokenConflict)?
            .ok_or(QueryError::CursorTokenMissing)?;
        if options.sort.is_empty() {
            return Err(QueryError::EmptySort);
        }

        let mut keys = Vec::with_capacity(options.sort.len());
        let mut joins: Vec<(String, String)> = Vec::new();

        for sort in &options.sort {
            let spec = SortSpec::parse(sort);
            let dir = match direction {
                CursorDirection::Forward => spec.dir,
                CursorDirection::Backward => spec.dir.reverse(),
            };
            match self.resolve(&spec) {
                Ok(resolved) => {
                    if let Some((alias, sql)) = resolved.join
                        && !joins.iter().any(|(a, _)| a.eq_ignore_ascii_case(&alias))
                    {
                        joins.push((alias, sql));
                    }
                    keys.push(KeyColumn {
                        anchor: resolved.anchor,
                        target: resolved.target,
                        dir,
                    });
                }
                Err(err) => {
                    tracing::warn!(table = %self.table, error = %err, "skipping cursor sort column");
                }
            }
        }

        if keys.is_empty() {
            return Err(QueryError::NoValidSortColumns);
        }

        let join_sql: String = joins.iter().map(|(_, sql)| format!(" {sql}")).collect();
        let chain = self.chain(&keys);
        tracing::debug!(
            table = %self.table,
            columns = keys.len(),
            joins = joins.len(),
            "built cursor filter"
        );

        let head = Predicate::raw(format!(
            "EXISTS (SELECT 1 FROM {table} {alias}{join_sql} WHERE {alias}.{pk} = ",
            table = self.table,
            alias = self.alias,
            pk = self.primary_key,
        ));
        let inline = self.primary_key_kind.is_none_or(FieldKind::is_integer);
        let anchored = match token.parse::<i64>() {
            Ok(id) if inline => head.sql(id.to_string()),
            _ => head.bind(token.to_owned()),
        };
        Ok(anchored.sql(format!(" AND ({chain}))")))
    }

    fn resolve(&self, spec: &SortSpec) -> Result<Resolved, FieldError> {
        let column = spec.column.as_str();
        let invalid = || FieldError::InvalidSortColumn(spec.qualified_name());

        if spec.relation.is_none()
            && let Some(expr) = self.computed.and_then(|c| c.get(column))
        {
            return Ok(Resolved {
                anchor: format!("({})", anchor_expr(&expr.expression, self.table, self.alias)),
                target: format!("({})", expr.expression),
                join: None,
            });
        }

        let Some(relation) = spec
            .relation
            .as_deref()
            .filter(|rel| !rel.eq_ignore_ascii_case(self.table))
        else {
            return if column_accepted(self.known_columns, column) {
                Ok(self.owner_sides(column))
            } else {
                Err(invalid())
            };
        };

        let join = self
            .joins
            .iter()
            .find(|j| j.alias.eq_ignore_ascii_case(relation))
            .ok_or_else(|| FieldError::MissingJoin {
                relation: relation.to_owned(),
                column: column.to_owned(),
            })?;
        let set = self
            .relation_columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(relation))
            .map(|&(_, set)| set);
        if !column_accepted(set, column) {
            return Err(invalid());
        }

        let target = format!("{}.{column}", join.alias);
        // JSON paths of joined relations are compared as written on both sides.
        if spec.is_json_path() {
            return Ok(Resolved {
                anchor: target.clone(),
                target,
                join: None,
            });
        }
        Ok(Resolved {
            anchor: format!("{}.{column}", join.scoped_alias(self.alias)),
            target,
            join: Some((
                join.alias.clone(),
                join.rewrite_for_cursor(self.table, self.alias),
            )),
        })
    }

    fn owner_sides(&self, column: &str) -> Resolved {
        Resolved {
            anchor: format!("{}.{column}", self.alias),
            target: format!("{}.{column}", self.table),
            join: None,
        }
    }

    /// OR of growing prefixes; see [`KeysetMode`].
    fn chain(&self, keys: &[KeyColumn]) -> String {
        (0..keys.len())
            .map(|i| {
                let terms: Vec<String> = keys[..=i]
                    .iter()
                    .enumerate()
                    .map(|(j, key)| match self.mode {
                        KeysetMode::Lexicographic if j < i => key.equal(),
                        KeysetMode::Lexicographic | KeysetMode::StrictPrefix => key.strict(),
                    })
                    .collect();
                format!("({})", terms.join(" AND "))
            })
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

fn column_accepted(set: Option<&ColumnSet>, column: &str) -> bool {
    match set {
        Some(set) => set.accepts(column),
        None => is_column_reference(column),
    }
}

/// Cursor predicate with the default alias and keyset mode.
///
/// # Errors
/// See [`CursorFilter::build`].
pub fn build_cursor_filter(
    options: &QueryOptions,
    table: &str,
    primary_key: &str,
    known_columns: Option<&ColumnSet>,
    joins: &[JoinDef],
) -> Result<Predicate, QueryError> {
    let mut filter = CursorFilter::new(table, primary_key).joins(joins);
    if let Some(columns) = known_columns {
        filter = filter.known_columns(columns);
    }
    filter.build(options)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn join_with_declared_alias() {
        let join = JoinDef::new("author", "LEFT JOIN users author ON author.id = posts.author_id");
        assert_eq!(
            join.rewrite_for_cursor("posts", "cursor_select"),
            "LEFT JOIN users cursor_select_author ON cursor_select_author.id = cursor_select.author_id"
        );
    }

    #[test]
    fn join_with_as_keyword() {
        let join = JoinDef::new("author", "JOIN users AS author ON author.id = posts.author_id");
        assert_eq!(
            join.rewrite_for_cursor("posts", "c"),
            "JOIN users AS c_author ON c_author.id = c.author_id"
        );
    }

    #[test]
    fn join_named_after_its_table_gets_an_alias() {
        let join = JoinDef::new("teams", "INNER JOIN teams ON teams.id = users.team_id");
        assert_eq!(
            join.rewrite_for_cursor("users", "cursor_select"),
            "INNER JOIN teams cursor_select_teams ON cursor_select_teams.id = cursor_select.team_id"
        );
    }

    #[test]
    fn strict_prefix_chain() {
        let keys = [
            KeyColumn {
                anchor: "a.x".to_owned(),
                target: "t.x".to_owned(),
                dir: SortDir::Asc,
            },
            KeyColumn {
                anchor: "a.y".to_owned(),
                target: "t.y".to_owned(),
                dir: SortDir::Desc,
            },
        ];
        let strict = CursorFilter::new("t", "id").mode(KeysetMode::StrictPrefix);
        assert_eq!(strict.chain(&keys), "(a.x < t.x) OR (a.x < t.x AND a.y > t.y)");
        let lex = CursorFilter::new("t", "id");
        assert_eq!(lex.chain(&keys), "(a.x < t.x) OR (a.x = t.x AND a.y > t.y)");
    }
}
