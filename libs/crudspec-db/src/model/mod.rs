//! Model metadata: declared fields, tag resolution and the per-model cache.

mod field;
mod kind;
mod registry;
mod resolver;
pub mod tags;

use std::borrow::Cow;

use crudspec_query::ComputedColumn;
use serde::{Deserialize, Serialize};

pub use field::{Embedded, FieldDef};
pub use kind::{FieldKind, TypeClass};
pub use registry::{DynamicModel, ModelEntry, ModelRegistry, RelationEntry};
pub use resolver::{ColumnDescriptor, KeyKind, ModelMeta, resolve_column_name};

/// A table-backed model the compiler can describe.
pub trait Model {
    /// Cache key in the [`ModelRegistry`]. Defaults to the Rust type name.
    fn model_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    fn table_name(&self) -> &str;

    /// Declared fields in declaration order.
    fn fields(&self) -> Vec<FieldDef>;

    /// Explicit primary key column; wins over every tag.
    fn primary_key_name(&self) -> Option<String> {
        None
    }

    /// Runtime value of a field, used for primary key extraction.
    fn field_value(&self, _ident: &str) -> Option<serde_json::Value> {
        None
    }

    /// Relations reachable through joins, used for relation sorts and preloads.
    fn relations(&self) -> Vec<RelationDef> {
        Vec::new()
    }

    /// Named SQL expressions registered for this model.
    fn computed_columns(&self) -> Vec<ComputedColumn> {
        Vec::new()
    }
}

/// A related table, joined under `name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationDef {
    /// Relation name, also the alias used by the join.
    pub name: String,
    pub table: String,
    /// Join SQL, e.g. `LEFT JOIN users author ON author.id = posts.author_id`.
    #[serde(default)]
    pub join: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}
