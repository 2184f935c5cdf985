use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use crudspec_db::{Dialect, RenderedSql, ValidationMode};
use crudspec_query::QueryOptions;
use sea_orm::sea_query::{MysqlQueryBuilder, PostgresQueryBuilder, QueryBuilder, SqliteQueryBuilder};
use sea_orm::{DbBackend, Statement, Value};
use serde::Deserialize;

use crate::common::{ModelArgs, read_document};

#[derive(Clone, Copy, Default, ValueEnum)]
enum Mode {
    /// Drop invalid column references with a warning
    #[default]
    Filter,
    /// Reject the request if any column reference is invalid
    FailFast,
}

impl From<Mode> for ValidationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Filter => ValidationMode::FilterAndWarn,
            Mode::FailFast => ValidationMode::FailFast,
        }
    }
}

/// A request document: query options plus an optional raw WHERE clause.
#[derive(Deserialize)]
struct RequestDoc {
    #[serde(flatten)]
    options: QueryOptions,
    #[serde(default, rename = "where")]
    where_clause: Option<String>,
}

#[derive(Args)]
pub struct ExplainArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Request document (YAML or JSON)
    #[arg(short = 'r', long)]
    request: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    mode: Mode,

    /// Print the statement with parameters inlined
    #[arg(long)]
    inline: bool,
}

impl ExplainArgs {
    pub fn run(&self) -> Result<()> {
        let (compiler, model, dialect) = self.model.load()?;
        let request: RequestDoc = read_document(&self.request)?;

        let mut query = compiler.compile(&model, request.options, self.mode.into())?;
        if let Some(expr) = request.where_clause.as_deref() {
            let condition = compiler.sanitize_where(&model, expr)?;
            query = query.and_where(&condition);
        }
        let rendered = query.to_select_sql(dialect);

        if self.inline {
            let Some(backend) = backend(dialect) else {
                anyhow::bail!("--inline needs a concrete dialect, got {dialect}");
            };
            let values = rendered.values();
            println!("{}", Statement::from_sql_and_values(backend, rendered.sql, values));
            return Ok(());
        }

        println!("{};", rendered.sql);
        print_params(dialect, &rendered);
        if query.reverse_results {
            println!("-- rows come back in reverse order; flip them before returning");
        }
        Ok(())
    }
}

fn print_params(dialect: Dialect, rendered: &RenderedSql) {
    for (idx, value) in rendered.values().iter().enumerate() {
        println!("-- {} = {}", idx + 1, value_text(dialect, value));
    }
}

fn backend(dialect: Dialect) -> Option<DbBackend> {
    match dialect {
        Dialect::Postgres => Some(DbBackend::Postgres),
        Dialect::MySql => Some(DbBackend::MySql),
        Dialect::Sqlite => Some(DbBackend::Sqlite),
        Dialect::Generic => None,
    }
}

fn value_text(dialect: Dialect, value: &Value) -> String {
    match dialect {
        Dialect::Postgres => PostgresQueryBuilder.value_to_string(value),
        Dialect::MySql => MysqlQueryBuilder.value_to_string(value),
        Dialect::Sqlite | Dialect::Generic => SqliteQueryBuilder.value_to_string(value),
    }
}
