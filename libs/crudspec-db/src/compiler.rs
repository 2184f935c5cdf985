//! Request to compiled query.
//!
//! [`QueryCompiler`] ties the pieces together for one model: column
//! validation, the select list, filters, the cursor predicate, ordering and
//! the page window. Nothing is executed; the result is rendered per dialect
//! or handed to the `SeaORM` bridge.

use std::sync::Arc;

use crudspec_query::{CursorDirection, NullsOrder, QueryOptions, SortDir, SortSpec};

use crate::Dialect;
use crate::columns::{ColumnSet, ColumnValidator, ValidationMode};
use crate::computed::{ComputedColumns, select_expr};
use crate::config::CompilerConfig;
use crate::cursor::CursorFilter;
use crate::error::{FieldError, QueryError};
use crate::filter::{chain_filters, compile_expression_filter, compile_filter, keep_compiled};
use crate::model::{Model, ModelEntry, ModelRegistry};
use crate::predicate::{Predicate, RenderedSql};
use crate::sanitize::WhereSanitizer;

/// Primary key assumed when a model declares none.
const FALLBACK_PRIMARY_KEY: &str = "id";

/* ---------- compiled output ---------- */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem {
    pub expr: String,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

impl OrderItem {
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self.nulls {
            // MySQL has no NULLS FIRST/LAST.
            Some(nulls) if dialect != Dialect::MySql => {
                format!("{} {} {}", self.expr, self.dir.as_sql(), nulls.as_sql())
            }
            _ => format!("{} {}", self.expr, self.dir.as_sql()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub table: String,
    /// Select items, already qualified.
    pub select: Vec<String>,
    /// Join SQL needed by relation sorts.
    pub joins: Vec<String>,
    pub predicate: Predicate,
    pub order: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Backward pages are fetched in reverse order; callers flip the rows.
    pub reverse_results: bool,
}

impl CompiledQuery {
    /// AND a raw, already sanitized condition into the predicate.
    #[must_use]
    pub fn and_where(mut self, condition: &str) -> Self {
        let condition = condition.trim();
        if !condition.is_empty() {
            self.predicate = self.predicate.and(Predicate::raw(condition));
        }
        self
    }

    #[must_use]
    pub fn where_sql(&self, dialect: Dialect) -> RenderedSql {
        self.predicate.render(dialect)
    }

    #[must_use]
    pub fn order_sql(&self, dialect: Dialect) -> String {
        self.order
            .iter()
            .map(|o| o.to_sql(dialect))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Complete SELECT statement for a dialect.
    #[must_use]
    pub fn to_select_sql(&self, dialect: Dialect) -> RenderedSql {
        let RenderedSql { sql: where_sql, params } = self.where_sql(dialect);
        let mut sql = format!("SELECT {} FROM {}", self.select.join(", "), self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_sql(dialect));
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&limit.to_string());
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }
        RenderedSql { sql, params }
    }
}

/* ---------- compiler ---------- */

pub struct QueryCompiler {
    registry: Arc<ModelRegistry>,
    config: CompilerConfig,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(Arc::new(ModelRegistry::new()), CompilerConfig::default())
    }
}

impl QueryCompiler {
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>, config: CompilerConfig) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Compile a request against a model.
    ///
    /// # Errors
    /// - request shape errors (limits, cursor conflict)
    /// - `QueryError::InvalidColumns` in `FailFast` mode
    /// - cursor errors, see [`CursorFilter::build`]
    pub fn compile<M: Model + ?Sized>(
        &self,
        model: &M,
        options: QueryOptions,
        mode: ValidationMode,
    ) -> Result<CompiledQuery, QueryError> {
        let cursor = options
            .cursor()
            .map_err(|_| QueryError::CursorTokenConflict)?
            .map(|(dir, _)| dir);
        let options = options.normalized();
        self.config.query_limits().validate(&options)?;

        let entry = self.registry.entry(model);
        let table = entry.table().to_owned();
        let computed = ComputedColumns::new(&entry.computed).with_request(
            &options.computed,
            &self.config.computed_prefix,
            self.config.allow_request_expressions,
        );
        let options = ColumnValidator::for_entry(&entry)
            .computed_prefix(&self.config.computed_prefix)
            .apply(options, mode)?;

        let mut predicate = self.filters(&entry, &options, &computed);
        if cursor.is_some() {
            let joins = entry.joins();
            let relation_columns: Vec<(&str, &ColumnSet)> = entry
                .relations
                .iter()
                .map(|r| (r.name.as_str(), &r.columns))
                .collect();
            let pk = primary_key(&entry);
            let mut filter = CursorFilter::new(&table, pk)
                .known_columns(&entry.columns)
                .relation_columns(&relation_columns)
                .joins(&joins)
                .computed(&computed)
                .alias(&self.config.cursor_alias)
                .mode(self.config.keyset_mode);
            if let Some(kind) = entry.meta.kind_of(pk) {
                filter = filter.primary_key_kind(kind);
            }
            predicate = predicate.and(filter.build(&options)?);
        }

        let backward = cursor == Some(CursorDirection::Backward);
        let (order, joins) = order_by(&entry, &options, &computed, backward);

        let offset = match (cursor, options.offset) {
            (Some(_), Some(skipped)) => {
                tracing::debug!(table = %table, offset = skipped, "offset ignored with cursor pagination");
                None
            }
            (_, offset) => offset,
        };

        let compiled = CompiledQuery {
            select: select_list(&entry, &options, &computed),
            joins,
            predicate,
            order,
            limit: Some(self.config.limits.clamp(options.limit)),
            offset,
            reverse_results: backward,
            table,
        };
        tracing::debug!(
            table = %compiled.table,
            params = compiled.predicate.param_count(),
            cursor = cursor.is_some(),
            "compiled query"
        );
        Ok(compiled)
    }

    /// Sanitize a raw WHERE expression for a model, qualifying its
    /// whitelisted columns with the model's table.
    ///
    /// # Errors
    /// `QueryError::Request` when the expression is too long, and
    /// `QueryError::UnqualifiableWhere` in strict mode.
    pub fn sanitize_where<M: Model + ?Sized>(
        &self,
        model: &M,
        expr: &str,
    ) -> Result<String, QueryError> {
        self.config.query_limits().validate_where(expr)?;
        let entry = self.registry.entry(model);
        let sanitizer = WhereSanitizer::new(entry.table()).whitelist(&entry.columns);
        if self.config.strict_where {
            sanitizer.sanitize_strict(expr)
        } else {
            Ok(sanitizer.sanitize(expr))
        }
    }

    fn filters(
        &self,
        entry: &ModelEntry,
        options: &QueryOptions,
        computed: &ComputedColumns,
    ) -> Predicate {
        let compiled = options.filters.iter().filter_map(|f| {
            let result = match computed.get(&f.column) {
                Some(c) => compile_expression_filter(f, &c.expression),
                None if self.is_computed_name(&f.column) => {
                    tracing::warn!(column = %f.column, "dropping filter on unknown computed column");
                    return None;
                }
                None => compile_filter(f, entry.table(), &entry.meta),
            };
            keep_compiled(f, result)
        });
        chain_filters(compiled)
    }

    fn is_computed_name(&self, column: &str) -> bool {
        let prefix = self.config.computed_prefix.as_str();
        let column = column.trim();
        column.len() >= prefix.len()
            && column.is_char_boundary(prefix.len())
            && column[..prefix.len()].eq_ignore_ascii_case(prefix)
    }
}

fn primary_key(entry: &ModelEntry) -> &str {
    entry.meta.primary_key().unwrap_or_else(|| {
        tracing::warn!(table = %entry.table(), "model has no primary key, assuming 'id'");
        FALLBACK_PRIMARY_KEY
    })
}

/// Selected columns minus omitted ones, then request computed columns.
fn select_list(entry: &ModelEntry, options: &QueryOptions, computed: &ComputedColumns) -> Vec<String> {
    let table = entry.table();
    let omitted = |name: &str| options.omit_columns.iter().any(|o| o.eq_ignore_ascii_case(name));
    let mut items = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    if options.columns.is_empty() && options.omit_columns.is_empty() {
        items.push(format!("{table}.*"));
    } else if options.columns.is_empty() {
        items.extend(
            entry
                .meta
                .column_names()
                .filter(|c| !omitted(c))
                .map(|c| format!("{table}.{c}")),
        );
    } else {
        for column in options.columns.iter().filter(|c| !omitted(c)) {
            if let Some(c) = computed.get(column) {
                items.push(select_expr(c));
                seen.push(&c.name);
            } else {
                let bare = match column.split_once('.') {
                    Some((qualifier, rest)) if qualifier.eq_ignore_ascii_case(table) => rest,
                    _ => column.as_str(),
                };
                if entry.columns.accepts(bare) {
                    items.push(format!("{table}.{bare}"));
                } else {
                    tracing::warn!(table = %table, column = %column, "dropping unknown column from select");
                }
            }
        }
    }

    for c in computed.requested() {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(&c.name)) && !omitted(&c.name) {
            items.push(select_expr(c));
        }
    }

    if items.is_empty() {
        tracing::debug!(table = %table, "every column omitted, selecting all");
        items.push(format!("{table}.*"));
    }
    items
}

/// ORDER BY items and the joins their relation columns need. Entries the
/// cursor would skip are skipped here too.
fn order_by(
    entry: &ModelEntry,
    options: &QueryOptions,
    computed: &ComputedColumns,
    backward: bool,
) -> (Vec<OrderItem>, Vec<String>) {
    let mut order = Vec::with_capacity(options.sort.len());
    let mut joins: Vec<String> = Vec::new();

    for sort in &options.sort {
        let spec = SortSpec::parse(sort);
        let expr = match order_expr(entry, &spec, computed) {
            Ok((expr, join)) => {
                if let Some(sql) = join
                    && !joins.iter().any(|j| j == sql)
                {
                    joins.push(sql.to_owned());
                }
                expr
            }
            Err(err) => {
                tracing::warn!(table = %entry.table(), error = %err, "skipping sort column");
                continue;
            }
        };

        let (dir, nulls) = if backward {
            (spec.dir.reverse(), spec.nulls.map(flip_nulls))
        } else {
            (spec.dir, spec.nulls)
        };
        order.push(OrderItem { expr, dir, nulls });
    }
    (order, joins)
}

/// Expression of one sort entry and the join SQL it needs.
fn order_expr<'e>(
    entry: &'e ModelEntry,
    spec: &SortSpec,
    computed: &ComputedColumns,
) -> Result<(String, Option<&'e str>), FieldError> {
    let table = entry.table();
    let column = spec.column.as_str();
    let invalid = || FieldError::InvalidSortColumn(spec.qualified_name());

    if spec.relation.is_none()
        && let Some(c) = computed.get(column)
    {
        return Ok((format!("({})", c.expression.trim()), None));
    }

    let Some(relation) = spec
        .relation
        .as_deref()
        .filter(|rel| !rel.eq_ignore_ascii_case(table))
    else {
        return if entry.columns.accepts(column) {
            Ok((format!("{table}.{column}"), None))
        } else {
            Err(invalid())
        };
    };

    let rel = entry.relation(relation).ok_or_else(invalid)?;
    if !rel.columns.accepts(column) {
        return Err(invalid());
    }
    let join = rel.join.as_ref().ok_or_else(|| FieldError::MissingJoin {
        relation: relation.to_owned(),
        column: column.to_owned(),
    })?;
    Ok((format!("{}.{column}", rel.name), Some(join.sql.as_str())))
}

fn flip_nulls(nulls: NullsOrder) -> NullsOrder {
    match nulls {
        NullsOrder::First => NullsOrder::Last,
        NullsOrder::Last => NullsOrder::First,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::{DynamicModel, FieldDef, FieldKind};
    use crudspec_query::{FilterOption, SortOption};
    use serde_json::json;

    fn posts() -> DynamicModel {
        DynamicModel {
            table: "posts".to_owned(),
            fields: vec![
                FieldDef::new("ID", FieldKind::I64).tag("id,pk"),
                FieldDef::new("Title", FieldKind::String),
                FieldDef::new("Score", FieldKind::I32),
            ],
            ..DynamicModel::default()
        }
    }

    #[test]
    fn plain_request_selects_everything() {
        let compiler = QueryCompiler::default();
        let q = compiler
            .compile(&posts(), QueryOptions::new(), ValidationMode::FilterAndWarn)
            .unwrap();
        assert_eq!(q.to_select_sql(Dialect::Generic).sql, "SELECT posts.* FROM posts LIMIT 25");
    }

    #[test]
    fn omit_expands_the_column_list() {
        let compiler = QueryCompiler::default();
        let mut options = QueryOptions::new();
        options.omit_columns = vec!["title".to_owned()];
        let q = compiler
            .compile(&posts(), options, ValidationMode::FailFast)
            .unwrap();
        assert_eq!(q.select, vec!["posts.id".to_owned(), "posts.score".to_owned()]);
    }

    #[test]
    fn backward_cursor_reverses_order_and_drops_offset() {
        let compiler = QueryCompiler::default();
        let mut options = QueryOptions::new()
            .sort_by(SortOption::desc("score"))
            .before("10")
            .with_limit(5);
        options.offset = Some(40);
        let q = compiler
            .compile(&posts(), options, ValidationMode::FilterAndWarn)
            .unwrap();
        assert!(q.reverse_results);
        assert_eq!(q.offset, None);
        assert_eq!(q.order_sql(Dialect::Generic), "posts.score ASC");
        assert!(q.predicate.to_string().contains("cursor_select.score < posts.score"));
    }

    #[test]
    fn filters_and_cursor_are_combined() {
        let compiler = QueryCompiler::default();
        let options = QueryOptions::new()
            .filter(FilterOption::new("score", "gt", json!(3)))
            .sort_by(SortOption::asc("id"))
            .after("42");
        let q = compiler
            .compile(&posts(), options, ValidationMode::FailFast)
            .unwrap();
        let sql = q.where_sql(Dialect::Postgres).sql;
        assert!(sql.starts_with("(posts.score > $1) AND (EXISTS (SELECT 1 FROM posts cursor_select"));
        assert!(sql.contains("cursor_select.id = 42"));
    }

    #[test]
    fn fail_fast_reports_every_bad_column() {
        let compiler = QueryCompiler::default();
        let options = QueryOptions::new()
            .select(["title", "secret"])
            .filter(FilterOption::new("nope", "eq", json!(1)));
        let err = compiler
            .compile(&posts(), options, ValidationMode::FailFast)
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidColumns(vec!["secret".to_owned(), "nope".to_owned()])
        );
    }

    #[test]
    fn sanitize_uses_the_model_whitelist() {
        let compiler = QueryCompiler::default();
        let out = compiler
            .sanitize_where(&posts(), "(title = 'a' AND 1=1 AND custom_fn(x))")
            .unwrap();
        assert_eq!(out, "posts.title = 'a' AND custom_fn(x)");
    }
}
