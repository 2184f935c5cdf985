use serde::{Deserialize, Serialize};

use super::FieldKind;

/// One declared field of a model, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Field identifier as written in the model type.
    #[serde(alias = "name")]
    pub ident: String,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
    /// Positional tag: `"name,pk,unique,fk,scanonly,readonly"`.
    #[serde(default, alias = "tag")]
    pub positional_tag: Option<String>,
    /// Keyed tag: `"column:name;primaryKey;unique;foreignKey:x;->"`.
    #[serde(default)]
    pub keyed_tag: Option<String>,
    /// Serialization name hint: `"name,omitempty"`.
    #[serde(default)]
    pub name_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Embedded>,
}

/// Fields of an embedded struct, flattened into the parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Embedded {
    Inline(Vec<FieldDef>),
    /// An optional embedded reference; `None` means unset and is skipped.
    Optional(Option<Vec<FieldDef>>),
}

impl FieldDef {
    #[must_use]
    pub fn new(ident: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            ident: ident.into(),
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn embed(ident: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            ident: ident.into(),
            embedded: Some(Embedded::Inline(fields)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn embed_optional(ident: impl Into<String>, fields: Option<Vec<FieldDef>>) -> Self {
        Self {
            ident: ident.into(),
            embedded: Some(Embedded::Optional(fields)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.positional_tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn keyed(mut self, tag: impl Into<String>) -> Self {
        self.keyed_tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.name_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}
