//! Column metadata resolution.
//!
//! Per field the column name is taken from the first source that provides
//! one: positional tag, keyed tag, name hint, lowercase identifier. A model's
//! `primary_key_name` provider overrides the tags for the primary key only.
//! Embedded fields are flattened depth-first; an unset optional embedded
//! reference contributes nothing.

use serde::Serialize;

use super::tags::{hint_name, parse_keyed, parse_positional};
use super::{Embedded, FieldDef, FieldKind, Model};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    #[default]
    None,
    Primary,
    Unique,
    Foreign,
}

/// Resolved description of one physical column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// Field identifier the column was resolved from.
    pub field: String,
    /// SQL column name.
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub key: KeyKind,
    pub writable: bool,
}

/// Immutable column table of one model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelMeta {
    table: String,
    columns: Vec<ColumnDescriptor>,
    primary_key: Option<String>,
    #[serde(skip)]
    primary_field: Option<String>,
    #[serde(skip)]
    pk_from_provider: bool,
}

impl ModelMeta {
    /// Resolve the column table of a model.
    #[must_use]
    pub fn resolve<M: Model + ?Sized>(model: &M) -> Self {
        Self::from_fields(
            model.table_name(),
            &model.fields(),
            model.primary_key_name(),
        )
    }

    /// Resolve from a bare field list. `primary_key` plays the role of the
    /// model's provider method.
    #[must_use]
    pub fn from_fields(table: &str, fields: &[FieldDef], primary_key: Option<String>) -> Self {
        let mut columns = Vec::new();
        flatten(fields, &mut columns);

        let pk_from_provider = primary_key.is_some();
        let (primary_key, primary_field) = match primary_key {
            Some(name) => {
                let field = columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(&name))
                    .map(|c| c.field.clone());
                (Some(name), field)
            }
            None => columns
                .iter()
                .find(|c| c.key == KeyKind::Primary)
                .or_else(|| columns.iter().find(|c| c.field.eq_ignore_ascii_case("id")))
                .map_or((None, None), |c| (Some(c.name.clone()), Some(c.field.clone()))),
        };

        Self {
            table: table.to_owned(),
            columns,
            primary_key,
            primary_field,
            pk_from_provider,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up by SQL name, case-insensitively.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// SQL name of the column a field identifier resolved to.
    #[must_use]
    pub fn column_name(&self, field: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.column(name).map(|c| c.kind)
    }

    /// Unknown names are writable: they may be dynamic or computed columns.
    #[must_use]
    pub fn is_writable(&self, name: &str) -> bool {
        self.column(name).is_none_or(|c| c.writable)
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.writable)
            .map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Read the primary key value of a model instance.
    ///
    /// Follows the same priority as the name resolution and falls back to a
    /// field named `id`. Returns `None` when nothing holds a non-null value.
    #[must_use]
    pub fn primary_key_value<M: Model + ?Sized>(&self, model: &M) -> Option<serde_json::Value> {
        let mut candidates: Vec<&str> = Vec::with_capacity(3);
        if let Some(field) = self.primary_field.as_deref() {
            candidates.push(field);
        }
        if self.pk_from_provider
            && let Some(name) = self.primary_key.as_deref()
        {
            candidates.push(name);
        }
        if let Some(id) = self
            .columns
            .iter()
            .find(|c| c.field.eq_ignore_ascii_case("id"))
        {
            candidates.push(id.field.as_str());
        }

        candidates
            .into_iter()
            .filter_map(|ident| model.field_value(ident))
            .find(|v| !v.is_null())
    }
}

/// Resolve the SQL column name of one field, `None` when the field is ignored.
#[must_use]
pub fn resolve_column_name(field: &FieldDef) -> Option<String> {
    resolve_field(field).map(|c| c.name)
}

fn resolve_field(field: &FieldDef) -> Option<ColumnDescriptor> {
    let positional = field.positional_tag.as_deref().map(parse_positional);
    let keyed = field.keyed_tag.as_deref().map(parse_keyed);
    let tags = [positional.as_ref(), keyed.as_ref()];

    if tags.iter().flatten().any(|t| t.ignored) {
        return None;
    }

    let name = tags
        .iter()
        .flatten()
        .find_map(|t| t.name.clone())
        .or_else(|| field.name_hint.as_deref().and_then(hint_name).map(str::to_owned))
        .unwrap_or_else(|| field.ident.to_lowercase());

    let any = |f: fn(&super::tags::TagInfo) -> bool| tags.iter().flatten().any(|t| f(t));
    let key = if any(|t| t.primary) {
        KeyKind::Primary
    } else if any(|t| t.unique) {
        KeyKind::Unique
    } else if any(|t| t.foreign) {
        KeyKind::Foreign
    } else {
        KeyKind::None
    };

    Some(ColumnDescriptor {
        field: field.ident.clone(),
        name,
        kind: field.kind,
        nullable: field.nullable && !any(|t| t.not_null),
        key,
        writable: !any(|t| t.read_only),
    })
}

fn flatten(fields: &[FieldDef], out: &mut Vec<ColumnDescriptor>) {
    for field in fields {
        match &field.embedded {
            Some(Embedded::Inline(inner) | Embedded::Optional(Some(inner))) => flatten(inner, out),
            Some(Embedded::Optional(None)) => {
                tracing::trace!(field = %field.ident, "skipping unset optional embedded field");
            }
            None => {
                let Some(column) = resolve_field(field) else {
                    continue;
                };
                if out.iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
                    tracing::debug!(
                        field = %field.ident,
                        column = %column.name,
                        "duplicate column name; keeping the first declaration"
                    );
                    continue;
                }
                out.push(column);
            }
        }
    }
}
