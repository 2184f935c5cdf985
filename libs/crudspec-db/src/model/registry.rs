//! Per-model metadata cache.
//!
//! Entries are built once per model key and never mutated afterwards; readers
//! share them through `Arc`. The registry is an explicit value owned by the
//! caller (usually inside a [`crate::QueryCompiler`]).

use std::borrow::Cow;
use std::sync::Arc;

use crudspec_query::ComputedColumn;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{FieldDef, Model, ModelMeta, RelationDef};
use crate::columns::ColumnSet;
use crate::cursor::JoinDef;

/// Cached metadata of a relation.
#[derive(Clone, Debug)]
pub struct RelationEntry {
    pub name: String,
    pub meta: ModelMeta,
    pub columns: ColumnSet,
    pub join: Option<JoinDef>,
}

impl RelationEntry {
    fn build(def: &RelationDef) -> Self {
        let meta = ModelMeta::from_fields(&def.table, &def.fields, None);
        let columns = ColumnSet::from_meta(&meta);
        Self {
            name: def.name.clone(),
            meta,
            columns,
            join: def
                .join
                .as_ref()
                .map(|sql| JoinDef::new(def.name.clone(), sql.clone())),
        }
    }
}

/// Everything the compiler needs to know about one model.
#[derive(Clone, Debug)]
pub struct ModelEntry {
    pub key: String,
    pub meta: ModelMeta,
    pub columns: ColumnSet,
    pub computed: Vec<ComputedColumn>,
    pub relations: Vec<RelationEntry>,
}

impl ModelEntry {
    #[must_use]
    pub fn build<M: Model + ?Sized>(model: &M) -> Self {
        let meta = ModelMeta::resolve(model);
        let columns = ColumnSet::from_meta(&meta);
        Self {
            key: model.model_key().into_owned(),
            meta,
            columns,
            computed: model.computed_columns(),
            relations: model.relations().iter().map(RelationEntry::build).collect(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        self.meta.table()
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationEntry> {
        self.relations
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Join definitions of every relation that declares one.
    #[must_use]
    pub fn joins(&self) -> Vec<JoinDef> {
        self.relations
            .iter()
            .filter_map(|r| r.join.clone())
            .collect()
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    entries: DashMap<String, Arc<ModelEntry>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry of a model, built on first use.
    ///
    /// Entries are keyed by [`Model::model_key`] alone. A later model with the
    /// same key gets the first entry back, even if its fields differ.
    #[must_use]
    pub fn entry<M: Model + ?Sized>(&self, model: &M) -> Arc<ModelEntry> {
        let key = model.model_key();
        if let Some(hit) = self.entries.get(key.as_ref()) {
            return Arc::clone(hit.value());
        }

        // The shard stays write-locked while building, so concurrent callers
        // for the same key wait and then read the stored entry.
        Arc::clone(
            self.entries
                .entry(key.into_owned())
                .or_insert_with(|| {
                    let entry = ModelEntry::build(model);
                    tracing::debug!(
                        model = %entry.key,
                        table = %entry.table(),
                        columns = entry.columns.len(),
                        "registered model metadata"
                    );
                    Arc::new(entry)
                })
                .value(),
        )
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<ModelEntry>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A model described at runtime, e.g. loaded from a YAML descriptor.
///
/// Cached as `dynamic:<table>` unless `key` is set; descriptors that share a
/// table but not their fields need distinct keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicModel {
    #[serde(default)]
    pub key: Option<String>,
    pub table: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub computed: Vec<ComputedColumn>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl Model for DynamicModel {
    fn model_key(&self) -> Cow<'_, str> {
        match &self.key {
            Some(key) => Cow::Borrowed(key.as_str()),
            None => Cow::Owned(format!("dynamic:{}", self.table)),
        }
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn fields(&self) -> Vec<FieldDef> {
        self.fields.clone()
    }

    fn primary_key_name(&self) -> Option<String> {
        self.primary_key.clone()
    }

    fn relations(&self) -> Vec<RelationDef> {
        self.relations.clone()
    }

    fn computed_columns(&self) -> Vec<ComputedColumn> {
        self.computed.clone()
    }
}
