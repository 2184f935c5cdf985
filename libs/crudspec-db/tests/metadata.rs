#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;

use crudspec_db::model::{
    DynamicModel, FieldDef, FieldKind, KeyKind, Model, ModelMeta, ModelRegistry, RelationDef,
    resolve_column_name,
};
use crudspec_db::{ColumnSet, ColumnValidator};
use serde_json::{Value as Json, json};

struct Account {
    id: i64,
    email: String,
}

impl Model for Account {
    fn table_name(&self) -> &str {
        "accounts"
    }

    fn fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::embed(
                "Audit",
                vec![
                    FieldDef::new("CreatedAt", FieldKind::DateTime).hint("created_at"),
                    FieldDef::new("UpdatedAt", FieldKind::DateTime).keyed("column:updated_at;->"),
                ],
            ),
            FieldDef::new("AccountID", FieldKind::I64).tag("account_id,pk"),
            FieldDef::new("Email", FieldKind::String).keyed("column:email;uniqueIndex"),
            FieldDef::embed_optional("Profile", None),
            FieldDef::new("OwnerID", FieldKind::I64).tag("owner_id,fk"),
            FieldDef::new("Password", FieldKind::String).tag("-"),
        ]
    }

    fn field_value(&self, ident: &str) -> Option<Json> {
        match ident {
            "AccountID" => Some(json!(self.id)),
            "Email" => Some(json!(self.email)),
            _ => None,
        }
    }
}

fn account() -> Account {
    Account {
        id: 7,
        email: "a@example.com".to_owned(),
    }
}

#[test]
fn embedded_fields_flatten_depth_first() {
    let meta = ModelMeta::resolve(&account());
    assert_eq!(
        meta.column_names().collect::<Vec<_>>(),
        vec!["created_at", "updated_at", "account_id", "email", "owner_id"]
    );
}

#[test]
fn keys_and_writability() {
    let meta = ModelMeta::resolve(&account());
    assert_eq!(meta.primary_key(), Some("account_id"));
    assert_eq!(meta.column("email").unwrap().key, KeyKind::Unique);
    assert_eq!(meta.column("owner_id").unwrap().key, KeyKind::Foreign);
    assert!(!meta.is_writable("updated_at"));
    assert!(meta.is_writable("created_at"));
}

#[test]
fn primary_key_value_reads_the_tagged_field() {
    let model = account();
    let meta = ModelMeta::resolve(&model);
    assert_eq!(meta.primary_key_value(&model), Some(json!(7)));
}

#[test]
fn explicit_primary_key_name_wins() {
    let model = DynamicModel {
        table: "accounts".to_owned(),
        primary_key: Some("email".to_owned()),
        fields: vec![
            FieldDef::new("ID", FieldKind::I64).tag("id,pk"),
            FieldDef::new("Email", FieldKind::String),
        ],
        ..DynamicModel::default()
    };
    assert_eq!(ModelMeta::resolve(&model).primary_key(), Some("email"));
}

#[test]
fn resolved_names_always_validate() {
    let models = [
        ModelMeta::resolve(&account()),
        ModelMeta::from_fields(
            "mixed",
            &[
                FieldDef::new("HTTPStatus", FieldKind::I32),
                FieldDef::new("Name", FieldKind::String).keyed("column:Display_Name"),
                FieldDef::new("Kind", FieldKind::String).hint("kind,omitempty"),
                FieldDef::embed("Inner", vec![FieldDef::new("Deep", FieldKind::Json).tag("deep")]),
            ],
            None,
        ),
    ];
    for meta in &models {
        let set = ColumnSet::from_meta(meta);
        let validator = ColumnValidator::new(meta.table(), &set);
        for column in meta.columns() {
            assert!(validator.validate(&column.name), "{}", column.name);
            assert_eq!(meta.column_name(&column.field), Some(column.name.as_str()));
        }
    }
}

#[test]
fn tag_priority_positional_then_keyed_then_hint() {
    let field = FieldDef::new("Title", FieldKind::String)
        .tag("headline")
        .keyed("column:caption")
        .hint("title_hint");
    assert_eq!(resolve_column_name(&field).as_deref(), Some("headline"));

    let field = FieldDef::new("Title", FieldKind::String)
        .keyed("column:caption")
        .hint("title_hint");
    assert_eq!(resolve_column_name(&field).as_deref(), Some("caption"));

    let field = FieldDef::new("Title", FieldKind::String).hint("title_hint,omitempty");
    assert_eq!(resolve_column_name(&field).as_deref(), Some("title_hint"));

    let field = FieldDef::new("Title", FieldKind::String).keyed("-");
    assert_eq!(resolve_column_name(&field), None);
}

#[test]
fn registry_builds_each_model_once() {
    let registry = Arc::new(ModelRegistry::new());
    let model = DynamicModel {
        table: "posts".to_owned(),
        fields: vec![FieldDef::new("ID", FieldKind::I64).tag("id,pk")],
        relations: vec![RelationDef {
            name: "author".to_owned(),
            table: "users".to_owned(),
            join: Some("LEFT JOIN users author ON author.id = posts.author_id".to_owned()),
            fields: vec![FieldDef::new("Name", FieldKind::String)],
        }],
        ..DynamicModel::default()
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let model = model.clone();
            thread::spawn(move || registry.entry(&model))
        })
        .collect();
    let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.len(), 1);
    assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
    let entry = registry.get("dynamic:posts").unwrap();
    assert!(entry.relation("AUTHOR").unwrap().columns.contains("name"));
    assert_eq!(entry.joins().len(), 1);
}

#[test]
fn same_key_returns_the_first_entry() {
    let registry = ModelRegistry::new();
    let narrow = DynamicModel {
        table: "posts".to_owned(),
        fields: vec![FieldDef::new("ID", FieldKind::I64).tag("id,pk")],
        ..DynamicModel::default()
    };
    let wide = DynamicModel {
        fields: vec![
            FieldDef::new("ID", FieldKind::I64).tag("id,pk"),
            FieldDef::new("Title", FieldKind::String),
        ],
        ..narrow.clone()
    };

    let first = registry.entry(&narrow);
    let again = registry.entry(&wide);
    assert!(Arc::ptr_eq(&first, &again));
    assert!(!again.columns.contains("title"));

    let keyed = DynamicModel {
        key: Some("posts:wide".to_owned()),
        ..wide
    };
    let entry = registry.entry(&keyed);
    assert!(entry.columns.contains("title"));
    assert_eq!(entry.key, "posts:wide");
    assert_eq!(registry.len(), 2);
}

#[test]
fn dynamic_models_load_from_yaml() {
    let yaml = r"
table: posts
fields:
  - name: ID
    type: bigint
    tag: id,pk
  - name: Title
    type: varchar
  - name: Meta
    type: jsonb
    nullable: true
computed:
  - name: cql_title_len
    expression: length(posts.title)
";
    let model: DynamicModel = serde_saphyr::from_str(yaml).unwrap();
    let meta = ModelMeta::resolve(&model);
    assert_eq!(meta.primary_key(), Some("id"));
    assert_eq!(meta.kind_of("title"), Some(FieldKind::String));
    assert_eq!(meta.kind_of("meta"), Some(FieldKind::Json));
    assert!(meta.column("meta").unwrap().nullable);
    assert_eq!(model.computed_columns().len(), 1);
}
