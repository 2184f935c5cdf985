//! `SeaORM` bridge.
//!
//! Compiled predicates become `sea_query` custom expressions with bound
//! values, so they compose with entity selects like any other condition.

use crudspec_query::{NullsOrder, SortDir};
use sea_orm::sea_query::{Expr, NullOrdering, Order, SimpleExpr};
use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::Dialect;
use crate::compiler::CompiledQuery;
use crate::predicate::Predicate;

impl Predicate {
    /// Custom expression for a backend; `None` for the empty predicate.
    #[must_use]
    pub fn to_sea_expr(&self, backend: DbBackend) -> Option<SimpleExpr> {
        if self.is_empty() {
            return None;
        }
        let rendered = self.render_positional(Dialect::from(backend));
        let values = rendered.values();
        Some(Expr::cust_with_values(rendered.sql, values))
    }
}

/// Extension trait for applying a compiled query to an entity select.
///
/// Only the predicate, ordering and page window are applied. The entity
/// defines the select list; relation sorts need the caller to add the joins
/// listed in [`CompiledQuery::joins`].
pub trait CompiledQueryExt<E: EntityTrait>: Sized {
    #[must_use]
    fn apply_compiled(self, compiled: &CompiledQuery, backend: DbBackend) -> Self;
}

impl<E> CompiledQueryExt<E> for sea_orm::Select<E>
where
    E: EntityTrait,
{
    fn apply_compiled(self, compiled: &CompiledQuery, backend: DbBackend) -> Self {
        let mut query = self;

        if let Some(cond) = compiled.predicate.to_sea_expr(backend) {
            query = query.filter(cond);
        }

        for item in &compiled.order {
            let sea_order = match item.dir {
                SortDir::Asc => Order::Asc,
                SortDir::Desc => Order::Desc,
            };
            let expr = Expr::cust(item.expr.clone());
            query = match item.nulls {
                Some(nulls) if backend != DbBackend::MySql => {
                    query.order_by_with_nulls(expr, sea_order, null_ordering(nulls))
                }
                _ => query.order_by(expr, sea_order),
            };
        }

        if let Some(limit) = compiled.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = compiled.offset {
            query = query.offset(offset);
        }
        query
    }
}

fn null_ordering(nulls: NullsOrder) -> NullOrdering {
    match nulls {
        NullsOrder::First => NullOrdering::First,
        NullsOrder::Last => NullOrdering::Last,
    }
}
