//! Structured filters to parameterized predicates.
//!
//! Cast rules, per the declared type of the filtered column:
//! - numeric column, numeric value(s): bind at the column's exact width, no cast
//! - numeric column, anything else: cast the column to text
//! - string column: never cast
//! - any other declared type: always cast to text
//! - unresolvable column: no cast

use crudspec_query::sort::{JSON_NAV_OPERATOR, is_column_reference};
use crudspec_query::{FilterOperator, FilterOption, LogicOperator};
use rust_decimal::Decimal;
use sea_orm::Value;
use serde_json::Value as Json;

use crate::error::FieldError;
use crate::model::{FieldKind, ModelMeta, TypeClass};
use crate::predicate::{ColumnRef, Predicate};

/// Cast decision for one filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CastInfo {
    pub needs_text_cast: bool,
    pub is_numeric: bool,
}

impl CastInfo {
    #[must_use]
    pub fn decide(kind: Option<FieldKind>, values: &[&Json]) -> Self {
        let Some(kind) = kind else {
            return Self::default();
        };
        match kind.class() {
            TypeClass::Numeric => {
                let all_numeric =
                    !values.is_empty() && values.iter().all(|v| to_width(kind, v).is_some());
                Self {
                    needs_text_cast: !all_numeric,
                    is_numeric: true,
                }
            }
            TypeClass::String => Self::default(),
            TypeClass::Boolean | TypeClass::Temporal | TypeClass::Other => Self {
                needs_text_cast: true,
                is_numeric: false,
            },
        }
    }
}

/// One compiled filter and how it joins the filters before it.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledFilter {
    pub predicate: Predicate,
    pub logic: LogicOperator,
    pub cast: CastInfo,
}

/// Compile one filter.
///
/// Unknown operators compile as equality with a warning.
///
/// # Errors
/// `FieldError::InvalidColumn` unless the column is a (dotted) identifier,
/// optionally with a well-formed JSON path; `FieldError::BetweenArity` when a
/// range operator does not get exactly two values.
pub fn compile_filter(
    filter: &FilterOption,
    owner_table: &str,
    meta: &ModelMeta,
) -> Result<CompiledFilter, FieldError> {
    let column = filter.column.trim();
    if !is_column_reference(column) {
        return Err(FieldError::InvalidColumn(filter.column.clone()));
    }

    let (qualifier, name) = qualify(column, owner_table);
    let kind = resolve_kind(meta, qualifier, name, owner_table);
    compile_on(filter, ColumnRef::new(qualifier, name), kind)
}

/// Compile a filter whose column is a computed expression. The expression is
/// compared as is, without a type-driven cast.
///
/// # Errors
/// `FieldError::BetweenArity` when a range operator does not get exactly two values.
pub fn compile_expression_filter(
    filter: &FilterOption,
    expression: &str,
) -> Result<CompiledFilter, FieldError> {
    compile_on(filter, ColumnRef::new(None, format!("({})", expression.trim())), None)
}

fn compile_on(
    filter: &FilterOption,
    mut col: ColumnRef,
    kind: Option<FieldKind>,
) -> Result<CompiledFilter, FieldError> {
    let column = filter.column.trim();
    let op = match &filter.operator {
        FilterOperator::Other(raw) => {
            let err = FieldError::UnknownOperator(raw.clone());
            tracing::warn!(column = %column, error = %err, "falling back to eq");
            FilterOperator::Eq
        }
        known => known.clone(),
    };

    let values = operand_values(&op, &filter.value);
    if matches!(op, FilterOperator::Between | FilterOperator::BetweenInclusive)
        && values.len() != 2
    {
        return Err(FieldError::BetweenArity {
            column: column.to_owned(),
            operator: op,
            got: values.len(),
        });
    }

    let cast = CastInfo::decide(kind, &values);
    if cast.needs_text_cast {
        col = col.cast_to_text();
    }
    let binds: Vec<Value> = values.iter().map(|v| bind_value(kind, cast, v)).collect();

    Ok(CompiledFilter {
        predicate: build_predicate(&op, &col, binds),
        logic: filter.logic_operator,
        cast,
    })
}

fn build_predicate(op: &FilterOperator, col: &ColumnRef, binds: Vec<Value>) -> Predicate {
    match op {
        FilterOperator::Eq | FilterOperator::Other(_) => compare(col, "=", first_or_null(&binds)),
        FilterOperator::Neq => compare(col, "!=", first_or_null(&binds)),
        FilterOperator::Gt => compare(col, ">", first_or_null(&binds)),
        FilterOperator::Gte => compare(col, ">=", first_or_null(&binds)),
        FilterOperator::Lt => compare(col, "<", first_or_null(&binds)),
        FilterOperator::Lte => compare(col, "<=", first_or_null(&binds)),
        FilterOperator::Like => compare(col, "LIKE", first_or_null(&binds)),
        FilterOperator::ILike => Predicate::new()
            .column(col)
            .sql(" ")
            .ilike()
            .sql(" ")
            .bind(first_or_null(&binds)),
        FilterOperator::In if binds.is_empty() => Predicate::always_false(),
        FilterOperator::In => Predicate::new()
            .column(col)
            .sql(" IN (")
            .bind_list(binds)
            .sql(")"),
        FilterOperator::Between | FilterOperator::BetweenInclusive => {
            let (lower, upper) = if *op == FilterOperator::Between {
                (">", "<")
            } else {
                (">=", "<=")
            };
            let mut bounds = binds.into_iter();
            let from = bounds.next().unwrap_or(Value::String(None));
            let to = bounds.next().unwrap_or(Value::String(None));
            compare(col, lower, from)
                .sql(" AND ")
                .append(compare(col, upper, to))
        }
        FilterOperator::IsNull => Predicate::raw("(")
            .column(col)
            .sql(" IS NULL OR ")
            .column(col)
            .sql(" = '')"),
        FilterOperator::IsNotNull => Predicate::raw("(")
            .column(col)
            .sql(" IS NOT NULL AND ")
            .column(col)
            .sql(" != '')"),
    }
}

/// Compile every filter, dropping the ones that fail with a warning.
#[must_use]
pub fn compile_filters(
    filters: &[FilterOption],
    owner_table: &str,
    meta: &ModelMeta,
) -> Vec<CompiledFilter> {
    filters
        .iter()
        .filter_map(|f| keep_compiled(f, compile_filter(f, owner_table, meta)))
        .collect()
}

/// Log and discard a failed compilation.
pub(crate) fn keep_compiled(
    filter: &FilterOption,
    compiled: Result<CompiledFilter, FieldError>,
) -> Option<CompiledFilter> {
    match compiled {
        Ok(c) => Some(c),
        Err(err) => {
            tracing::warn!(column = %filter.column, error = %err, "dropping filter");
            None
        }
    }
}

/// Join compiled filters in order: `((p1) AND (p2)) OR (p3)`. The logic
/// operator of the first filter is ignored.
#[must_use]
pub fn chain_filters<I>(filters: I) -> Predicate
where
    I: IntoIterator<Item = CompiledFilter>,
{
    filters
        .into_iter()
        .fold(Predicate::new(), |acc, f| acc.combine(f.logic, f.predicate))
}

/* ---------- helpers ---------- */

fn first_or_null(binds: &[Value]) -> Value {
    binds.first().cloned().unwrap_or(Value::String(None))
}

fn compare(col: &ColumnRef, op: &str, value: Value) -> Predicate {
    Predicate::new()
        .column(col)
        .sql(format!(" {op} "))
        .bind(value)
}

/// Split `rel.col` and qualify bare names with the owner table. Dots after a
/// JSON navigation operator belong to the path.
fn qualify<'a>(column: &'a str, owner_table: &'a str) -> (Option<&'a str>, &'a str) {
    let head_end = column.find(JSON_NAV_OPERATOR).unwrap_or(column.len());
    match column[..head_end].rfind('.') {
        Some(dot) if dot > 0 => (Some(&column[..dot]), &column[dot + 1..]),
        _ => (Some(owner_table), column),
    }
}

fn resolve_kind(
    meta: &ModelMeta,
    qualifier: Option<&str>,
    name: &str,
    owner_table: &str,
) -> Option<FieldKind> {
    if name.contains(JSON_NAV_OPERATOR) {
        return None;
    }
    let owned = qualifier.is_none_or(|q| {
        q.is_empty() || q.eq_ignore_ascii_case(owner_table) || q.eq_ignore_ascii_case(meta.table())
    });
    if owned { meta.kind_of(name) } else { None }
}

fn operand_values<'v>(op: &FilterOperator, value: &'v Json) -> Vec<&'v Json> {
    if op.is_nullary() {
        return Vec::new();
    }
    match (op, value) {
        (
            FilterOperator::In | FilterOperator::Between | FilterOperator::BetweenInclusive,
            Json::Array(items),
        ) => items.iter().collect(),
        (FilterOperator::In | FilterOperator::Between | FilterOperator::BetweenInclusive, Json::Null) => {
            Vec::new()
        }
        _ => vec![value],
    }
}

fn bind_value(kind: Option<FieldKind>, cast: CastInfo, value: &Json) -> Value {
    if cast.needs_text_cast || kind == Some(FieldKind::String) {
        return Value::from(json_text(value));
    }
    match kind {
        Some(k) if k.is_numeric() => to_width(k, value).unwrap_or_else(|| json_value(value)),
        _ => json_value(value),
    }
}

/// Textual form of a number, from a JSON number or a numeric string.
fn numeric_text(value: &Json) -> Option<String> {
    match value {
        Json::Number(n) => Some(n.to_string()),
        Json::String(s) => {
            let t = s.trim();
            t.parse::<f64>()
                .is_ok_and(f64::is_finite)
                .then(|| t.to_owned())
        }
        _ => None,
    }
}

/// Convert to the exact numeric width of `kind`; `None` when the value is
/// not numeric or does not fit.
fn to_width(kind: FieldKind, value: &Json) -> Option<Value> {
    let text = numeric_text(value)?;
    let int = || text.parse::<i128>().ok();
    Some(match kind {
        FieldKind::I8 => Value::from(i8::try_from(int()?).ok()?),
        FieldKind::I16 => Value::from(i16::try_from(int()?).ok()?),
        FieldKind::I32 => Value::from(i32::try_from(int()?).ok()?),
        FieldKind::I64 => Value::from(i64::try_from(int()?).ok()?),
        FieldKind::U8 => Value::from(u8::try_from(int()?).ok()?),
        FieldKind::U16 => Value::from(u16::try_from(int()?).ok()?),
        FieldKind::U32 => Value::from(u32::try_from(int()?).ok()?),
        FieldKind::U64 => Value::from(u64::try_from(int()?).ok()?),
        FieldKind::F32 => Value::from(text.parse::<f32>().ok().filter(|f| f.is_finite())?),
        FieldKind::F64 => Value::from(text.parse::<f64>().ok().filter(|f| f.is_finite())?),
        FieldKind::Decimal => Value::from(
            Decimal::from_str_exact(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()?,
        ),
        _ => return None,
    })
}

fn json_text(value: &Json) -> Option<String> {
    match value {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Bind a JSON value without type information.
fn json_value(value: &Json) -> Value {
    match value {
        Json::Null => Value::String(None),
        Json::Bool(b) => Value::from(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64())
            }
        }
        Json::String(s) => Value::from(s.clone()),
        other => Value::from(other.to_string()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::Dialect;
    use crate::model::FieldDef;
    use serde_json::json;

    fn meta() -> ModelMeta {
        ModelMeta::from_fields(
            "posts",
            &[
                FieldDef::new("ID", FieldKind::I64).tag("id,pk"),
                FieldDef::new("Score", FieldKind::I32),
                FieldDef::new("Level", FieldKind::U8),
                FieldDef::new("Ratio", FieldKind::F64),
                FieldDef::new("Title", FieldKind::String),
                FieldDef::new("Published", FieldKind::Bool),
                FieldDef::new("CreatedAt", FieldKind::DateTime).hint("created_at"),
            ],
            None,
        )
    }

    fn compile(column: &str, op: &str, value: Json) -> CompiledFilter {
        compile_filter(&FilterOption::new(column, op, value), "posts", &meta()).unwrap()
    }

    #[test]
    fn numeric_value_binds_exact_width() {
        let c = compile("score", "gte", json!(10));
        let r = c.predicate.render(Dialect::Generic);
        assert_eq!(r.sql, "posts.score >= ?");
        assert_eq!(r.values(), vec![Value::Int(Some(10))]);
        assert_eq!(c.cast, CastInfo { needs_text_cast: false, is_numeric: true });
    }

    #[test]
    fn numeric_string_is_parsed() {
        let c = compile("level", "eq", json!("7"));
        assert_eq!(c.predicate.render(Dialect::Generic).values(), vec![Value::TinyUnsigned(Some(7))]);
    }

    #[test]
    fn out_of_range_value_casts_to_text() {
        let c = compile("level", "eq", json!(300));
        let r = c.predicate.render(Dialect::Postgres);
        assert_eq!(r.sql, "posts.level::text = $1");
        assert_eq!(r.values(), vec![Value::from("300".to_owned())]);
    }

    #[test]
    fn numeric_column_with_text_value_casts() {
        let c = compile("score", "like", json!("1%"));
        assert!(c.cast.needs_text_cast);
        assert_eq!(c.predicate.render(Dialect::MySql).sql, "CAST(posts.score AS CHAR) LIKE ?");
    }

    #[test]
    fn string_column_is_never_cast() {
        let c = compile("title", "eq", json!(42));
        let r = c.predicate.render(Dialect::Postgres);
        assert_eq!(r.sql, "posts.title = $1");
        assert_eq!(r.values(), vec![Value::from("42".to_owned())]);
    }

    #[test]
    fn other_types_always_cast() {
        let c = compile("published", "eq", json!(true));
        assert_eq!(c.predicate.render(Dialect::Sqlite).sql, "CAST(posts.published AS TEXT) = ?");
        let c = compile("created_at", "gt", json!("2024-01-01"));
        assert!(c.cast.needs_text_cast);
    }

    #[test]
    fn unresolvable_column_is_not_cast() {
        let c = compile("author.name", "eq", json!("ann"));
        assert_eq!(c.predicate.to_string(), "author.name = ?");
        assert!(!c.cast.needs_text_cast);
    }

    #[test]
    fn json_navigation_needs_a_well_formed_path() {
        let c = compile("meta->>'plan'", "eq", json!("pro"));
        assert_eq!(c.predicate.to_string(), "posts.meta->>'plan' = ?");

        for column in [
            "meta->>'a' = 'x' OR 1=1 OR posts.id",
            "meta->>'a\\'",
            "score; DROP TABLE posts",
        ] {
            let err = compile_filter(&FilterOption::new(column, "eq", json!(1)), "posts", &meta())
                .unwrap_err();
            assert_eq!(err, FieldError::InvalidColumn(column.to_owned()));
        }
    }

    #[test]
    fn in_list_and_empty_in() {
        let c = compile("id", "in", json!([1, 2, 3]));
        assert_eq!(c.predicate.render(Dialect::Generic).sql, "posts.id IN (?)");
        assert_eq!(c.predicate.render(Dialect::Postgres).sql, "posts.id IN ($1, $2, $3)");

        let empty = compile("id", "in", json!([]));
        assert_eq!(empty.predicate.to_string(), "1=0");
    }

    #[test]
    fn between_inclusive_uses_closed_bounds() {
        let c = compile("ratio", "between_inclusive", json!([0.5, 1.5]));
        let r = c.predicate.render(Dialect::Generic);
        assert_eq!(r.sql, "posts.ratio >= ? AND posts.ratio <= ?");
        assert_eq!(r.values(), vec![Value::Double(Some(0.5)), Value::Double(Some(1.5))]);
    }

    #[test]
    fn null_checks_treat_empty_string_as_null() {
        let c = compile("title", "is_null", Json::Null);
        assert_eq!(c.predicate.to_string(), "(posts.title IS NULL OR posts.title = '')");
        let c = compile("title", "is_not_null", Json::Null);
        assert_eq!(c.predicate.to_string(), "(posts.title IS NOT NULL AND posts.title != '')");
        let c = compile("score", "is_null", Json::Null);
        assert_eq!(
            c.predicate.render(Dialect::Postgres).sql,
            "(posts.score::text IS NULL OR posts.score::text = '')"
        );
    }

    #[test]
    fn ilike_degrades_outside_postgres() {
        let c = compile("title", "ilike", json!("%rust%"));
        assert_eq!(c.predicate.render(Dialect::Postgres).sql, "posts.title ILIKE $1");
        assert_eq!(c.predicate.render(Dialect::Sqlite).sql, "posts.title LIKE ?");
    }

    #[test]
    fn chain_is_left_associative() {
        let filters = [
            FilterOption::new("score", "gt", json!(1)),
            FilterOption::new("title", "eq", json!("a")).or(),
            FilterOption::new("title", "eq", json!("b")).or(),
        ];
        let compiled = compile_filters(&filters, "posts", &meta());
        assert_eq!(compiled.len(), 3);
        assert_eq!(
            chain_filters(compiled).to_string(),
            "((posts.score > ?) OR (posts.title = ?)) OR (posts.title = ?)"
        );
    }
}
