//! Parameterized SQL predicate builder.
//!
//! A [`Predicate`] is a sequence of SQL text, column references, dialect
//! keywords and bound parameters. Nothing is rendered until [`Predicate::render`]
//! is called with a [`Dialect`], so qualification and text casting are
//! structural decisions rather than substring rewrites of finished SQL.

use std::fmt;

use crudspec_query::LogicOperator;
use sea_orm::Value;

use crate::Dialect;

/// A bound parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Bind {
    Value(Value),
    /// Parameter of an `IN (?)` list.
    List(Vec<Value>),
}

impl Bind {
    fn len(&self) -> usize {
        match self {
            Bind::Value(_) => 1,
            Bind::List(items) => items.len(),
        }
    }
}

/// A column reference inside a predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    /// Bare column name or JSON navigation expression.
    pub name: String,
    pub text_cast: bool,
}

impl ColumnRef {
    #[must_use]
    pub fn new(qualifier: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.filter(|q| !q.is_empty()).map(str::to_owned),
            name: name.into(),
            text_cast: false,
        }
    }

    #[must_use]
    pub fn cast_to_text(mut self) -> Self {
        self.text_cast = true;
        self
    }

    /// `qualifier.name` without any cast.
    #[must_use]
    pub fn expr(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{q}.{}", self.name),
            None => self.name.clone(),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        let expr = self.expr();
        if self.text_cast {
            dialect.text_cast(&expr)
        } else {
            expr
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Piece {
    Sql(String),
    Column(ColumnRef),
    Param(Bind),
    ILike,
}

#[derive(Clone, Copy)]
enum Placeholders {
    Question { expand: bool },
    Numbered,
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<Bind>,
}

impl RenderedSql {
    /// All bound values with list parameters flattened.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.params.len());
        for bind in &self.params {
            match bind {
                Bind::Value(v) => out.push(v.clone()),
                Bind::List(items) => out.extend(items.iter().cloned()),
            }
        }
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate {
    pieces: Vec<Piece>,
}

impl Predicate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal SQL with no parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new().sql(sql)
    }

    /// The `1=0` predicate.
    #[must_use]
    pub fn always_false() -> Self {
        Self::raw("1=0")
    }

    #[must_use]
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        if sql.is_empty() {
            return self;
        }
        if let Some(Piece::Sql(last)) = self.pieces.last_mut() {
            last.push_str(&sql);
        } else {
            self.pieces.push(Piece::Sql(sql));
        }
        self
    }

    #[must_use]
    pub fn column(mut self, column: &ColumnRef) -> Self {
        self.pieces.push(Piece::Column(column.clone()));
        self
    }

    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.pieces.push(Piece::Param(Bind::Value(value.into())));
        self
    }

    #[must_use]
    pub fn bind_list(mut self, values: Vec<Value>) -> Self {
        self.pieces.push(Piece::Param(Bind::List(values)));
        self
    }

    /// Case-insensitive LIKE keyword, `LIKE` where the dialect lacks `ILIKE`.
    #[must_use]
    pub fn ilike(mut self) -> Self {
        self.pieces.push(Piece::ILike);
        self
    }

    #[must_use]
    pub fn append(mut self, other: Predicate) -> Self {
        for piece in other.pieces {
            self = match piece {
                Piece::Sql(s) => self.sql(s),
                p => {
                    self.pieces.push(p);
                    self
                }
            };
        }
        self
    }

    /// Wrap in parentheses.
    #[must_use]
    pub fn group(self) -> Self {
        if self.is_empty() {
            return self;
        }
        Self::raw("(").append(self).sql(")")
    }

    /// `(self) <op> (other)`; an empty side yields the other side unchanged.
    #[must_use]
    pub fn combine(self, op: LogicOperator, other: Predicate) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        self.group()
            .sql(format!(" {} ", op.as_sql()))
            .append(other.group())
    }

    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        self.combine(LogicOperator::And, other)
    }

    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        self.combine(LogicOperator::Or, other)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn binds(&self) -> impl Iterator<Item = &Bind> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Param(b) => Some(b),
            _ => None,
        })
    }

    /// Render for a dialect: `$n` on Postgres, `?` elsewhere.
    #[must_use]
    pub fn render(&self, dialect: Dialect) -> RenderedSql {
        let style = match dialect {
            Dialect::Postgres => Placeholders::Numbered,
            other => Placeholders::Question {
                expand: other.expands_lists(),
            },
        };
        self.render_with(dialect, style)
    }

    /// Render with expanded `?` placeholders and the dialect's casts, the form
    /// `sea_query::Expr::cust_with_values` expects on every backend.
    pub(crate) fn render_positional(&self, dialect: Dialect) -> RenderedSql {
        self.render_with(dialect, Placeholders::Question { expand: true })
    }

    fn render_with(&self, dialect: Dialect, style: Placeholders) -> RenderedSql {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut next = 1usize;

        for piece in &self.pieces {
            match piece {
                Piece::Sql(s) => sql.push_str(s),
                Piece::Column(c) => sql.push_str(&c.render(dialect)),
                Piece::ILike => sql.push_str(if dialect.supports_ilike() {
                    "ILIKE"
                } else {
                    "LIKE"
                }),
                Piece::Param(Bind::Value(v)) => {
                    push_placeholder(&mut sql, style, &mut next);
                    params.push(Bind::Value(v.clone()));
                }
                Piece::Param(Bind::List(items)) => match style {
                    Placeholders::Question { expand: false } => {
                        push_placeholder(&mut sql, style, &mut next);
                        params.push(Bind::List(items.clone()));
                    }
                    _ if items.is_empty() => sql.push_str("NULL"),
                    _ => {
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                sql.push_str(", ");
                            }
                            push_placeholder(&mut sql, style, &mut next);
                            params.push(Bind::Value(item.clone()));
                        }
                    }
                },
            }
        }

        RenderedSql { sql, params }
    }

    /// Number of placeholders the generic rendering carries.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.binds().count()
    }

    /// Number of scalar values once lists are expanded.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.binds().map(Bind::len).sum()
    }
}

fn push_placeholder(sql: &mut String, style: Placeholders, next: &mut usize) {
    match style {
        Placeholders::Question { .. } => sql.push('?'),
        Placeholders::Numbered => {
            sql.push('$');
            sql.push_str(&next.to_string());
        }
    }
    *next += 1;
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Dialect::Generic).sql)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn in_list() -> Predicate {
        let col = ColumnRef::new(Some("users"), "id");
        Predicate::new()
            .column(&col)
            .sql(" IN (")
            .bind_list(vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)])
            .sql(")")
    }

    #[test]
    fn generic_keeps_list_as_single_placeholder() {
        let r = in_list().render(Dialect::Generic);
        assert_eq!(r.sql, "users.id IN (?)");
        assert_eq!(r.params.len(), 1);
        assert_eq!(r.values().len(), 3);
    }

    #[test]
    fn postgres_numbers_and_expands() {
        let p = in_list()
            .and(Predicate::raw("users.name = ").bind("bob".to_owned()));
        let r = p.render(Dialect::Postgres);
        assert_eq!(r.sql, "(users.id IN ($1, $2, $3)) AND (users.name = $4)");
        assert_eq!(r.values().len(), 4);
    }

    #[test]
    fn mysql_expands_question_marks() {
        let r = in_list().render(Dialect::MySql);
        assert_eq!(r.sql, "users.id IN (?, ?, ?)");
    }

    #[test]
    fn text_cast_and_ilike_follow_dialect() {
        let col = ColumnRef::new(Some("t"), "score").cast_to_text();
        let p = Predicate::new()
            .column(&col)
            .sql(" ")
            .ilike()
            .sql(" ")
            .bind("%1%".to_owned());
        assert_eq!(p.render(Dialect::Postgres).sql, "t.score::text ILIKE $1");
        assert_eq!(p.render(Dialect::MySql).sql, "CAST(t.score AS CHAR) LIKE ?");
        assert_eq!(p.render(Dialect::Sqlite).sql, "CAST(t.score AS TEXT) LIKE ?");
    }

    #[test]
    fn combine_with_empty_side_is_identity() {
        let p = Predicate::raw("a = 1");
        assert_eq!(Predicate::new().and(p.clone()), p);
        assert_eq!(p.clone().or(Predicate::new()), p);
        assert_eq!(p.clone().or(Predicate::raw("b = 2")).to_string(), "(a = 1) OR (b = 2)");
    }
}
