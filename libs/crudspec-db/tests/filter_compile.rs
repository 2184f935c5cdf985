#![allow(clippy::unwrap_used, clippy::expect_used)]

use crudspec_db::model::{FieldDef, FieldKind, ModelMeta};
use crudspec_db::{Dialect, FieldError, chain_filters, compile_filter, compile_filters};
use crudspec_query::{FilterOperator, FilterOption};
use rust_decimal::Decimal;
use sea_orm::Value;
use serde_json::json;
use tracing_test::traced_test;

fn orders() -> ModelMeta {
    ModelMeta::from_fields(
        "orders",
        &[
            FieldDef::new("ID", FieldKind::U64).tag("id,pk"),
            FieldDef::new("Total", FieldKind::Decimal),
            FieldDef::new("Qty", FieldKind::I16),
            FieldDef::new("Status", FieldKind::String),
            FieldDef::new("Paid", FieldKind::Bool),
        ],
        None,
    )
}

#[test]
fn between_binds_both_bounds() {
    let f = FilterOption::new("qty", "between", json!([10, 20]));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    let r = c.predicate.render(Dialect::Generic);
    assert_eq!(r.sql, "orders.qty > ? AND orders.qty < ?");
    assert_eq!(r.values(), vec![Value::SmallInt(Some(10)), Value::SmallInt(Some(20))]);
}

#[test]
#[traced_test]
fn between_with_one_value_is_dropped() {
    let filters = [
        FilterOption::new("qty", "between", json!([10])),
        FilterOption::new("status", "eq", json!("open")),
    ];
    let compiled = compile_filters(&filters, "orders", &orders());
    assert_eq!(compiled.len(), 1);
    assert_eq!(chain_filters(compiled).to_string(), "orders.status = ?");
    assert!(logs_contain("between on qty requires exactly 2 values, got 1"));
}

#[test]
fn between_arity_error_names_the_operator() {
    let f = FilterOption::new("qty", "between_inclusive", json!([1, 2, 3]));
    let err = compile_filter(&f, "orders", &orders()).unwrap_err();
    assert_eq!(
        err,
        FieldError::BetweenArity {
            column: "qty".to_owned(),
            operator: FilterOperator::BetweenInclusive,
            got: 3,
        }
    );
}

#[test]
#[traced_test]
fn unknown_operator_degrades_to_equality() {
    let f = FilterOption::new("status", "startswith", json!("op"));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    assert_eq!(c.predicate.to_string(), "orders.status = ?");
    assert!(logs_contain("unknown filter operator: startswith"));
}

#[test]
fn decimal_column_binds_decimal() {
    let f = FilterOption::new("total", "lte", json!("19.99"));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    assert_eq!(
        c.predicate.render(Dialect::Generic).values(),
        vec![Value::from(Decimal::new(1999, 2))]
    );
    assert!(!c.cast.needs_text_cast);
}

#[test]
fn negative_value_on_unsigned_column_casts() {
    let f = FilterOption::new("id", "eq", json!(-1));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    assert!(c.cast.needs_text_cast);
    assert_eq!(c.predicate.render(Dialect::Postgres).sql, "orders.id::text = $1");
}

#[test]
fn in_list_expands_per_dialect() {
    let f = FilterOption::new("id", "in", json!([3, "4", 5]));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    assert_eq!(c.predicate.render(Dialect::Generic).sql, "orders.id IN (?)");
    assert_eq!(c.predicate.render(Dialect::Sqlite).sql, "orders.id IN (?, ?, ?)");
    assert_eq!(
        c.predicate.render(Dialect::Postgres).values(),
        vec![
            Value::BigUnsigned(Some(3)),
            Value::BigUnsigned(Some(4)),
            Value::BigUnsigned(Some(5)),
        ]
    );
}

#[test]
fn already_qualified_column_keeps_its_prefix() {
    let f = FilterOption::new("orders.status", "neq", json!("void"));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    assert_eq!(c.predicate.to_string(), "orders.status != ?");
}

#[test]
fn boolean_column_compares_as_text() {
    let f = FilterOption::new("paid", "eq", json!(true));
    let c = compile_filter(&f, "orders", &orders()).unwrap();
    let r = c.predicate.render(Dialect::MySql);
    assert_eq!(r.sql, "CAST(orders.paid AS CHAR) = ?");
    assert_eq!(r.values(), vec![Value::from("true".to_owned())]);
}

#[test]
fn logic_operators_chain_in_order() {
    let filters = [
        FilterOption::new("status", "eq", json!("open")),
        FilterOption::new("status", "eq", json!("held")).or(),
        FilterOption::new("qty", "gt", json!(0)),
    ];
    let sql = chain_filters(compile_filters(&filters, "orders", &orders()))
        .render(Dialect::Postgres)
        .sql;
    assert_eq!(
        sql,
        "((orders.status = $1) OR (orders.status = $2)) AND (orders.qty > $3)"
    );
}
