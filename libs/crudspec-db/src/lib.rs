#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Query compilation for generic CRUD access.
//!
//! Turns a structured, untrusted [`crudspec_query::QueryOptions`] into
//! parameterized SQL fragments for one model: whitelisted columns, typed
//! filter predicates, sanitized raw WHERE clauses and keyset (cursor)
//! pagination through a correlated `EXISTS` subquery. Nothing here executes
//! SQL; the output is rendered per [`Dialect`] or applied to a `SeaORM`
//! select through [`CompiledQueryExt`].
//!
//! # Example
//! ```rust
//! use crudspec_db::model::{DynamicModel, FieldDef, FieldKind};
//! use crudspec_db::{Dialect, QueryCompiler, ValidationMode};
//! use crudspec_query::{QueryOptions, SortOption};
//!
//! let posts = DynamicModel {
//!     table: "posts".to_owned(),
//!     fields: vec![
//!         FieldDef::new("ID", FieldKind::I64).tag("id,pk"),
//!         FieldDef::new("CreatedAt", FieldKind::DateTime).hint("created_at"),
//!     ],
//!     ..DynamicModel::default()
//! };
//!
//! let compiler = QueryCompiler::default();
//! let options = QueryOptions::new()
//!     .sort_by(SortOption::desc("created_at"))
//!     .sort_by(SortOption::asc("id"))
//!     .after("42");
//! let query = compiler
//!     .compile(&posts, options, ValidationMode::FilterAndWarn)
//!     .unwrap();
//! let sql = query.to_select_sql(Dialect::Postgres).sql;
//! assert!(sql.contains("EXISTS (SELECT 1 FROM posts cursor_select"));
//! ```

pub mod columns;
pub mod compiler;
pub mod computed;
pub mod config;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod model;
pub mod predicate;
pub mod sanitize;
pub mod sea;

pub use columns::{ColumnSet, ColumnValidator, ValidationMode};
pub use compiler::{CompiledQuery, OrderItem, QueryCompiler};
pub use computed::ComputedColumns;
pub use config::{CompilerConfig, KeysetMode, LimitCfg};
pub use cursor::{CursorFilter, JoinDef, build_cursor_filter};
pub use dialect::Dialect;
pub use error::{ConfigError, FieldError, QueryError};
pub use filter::{CastInfo, CompiledFilter, chain_filters, compile_filter, compile_filters};
pub use model::{Model, ModelRegistry};
pub use predicate::{Bind, ColumnRef, Predicate, RenderedSql};
pub use sanitize::{WhereSanitizer, sanitize};
pub use sea::CompiledQueryExt;
