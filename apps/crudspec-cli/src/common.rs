use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use crudspec_db::model::DynamicModel;
use crudspec_db::{CompilerConfig, Dialect, QueryCompiler};
use serde::de::DeserializeOwned;

#[derive(Args)]
pub struct ConfigFileArgs {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl ConfigFileArgs {
    pub fn path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

#[derive(Args)]
pub struct ModelArgs {
    /// Model descriptor (YAML or JSON)
    #[arg(short = 'm', long)]
    model: PathBuf,

    /// SQL dialect; defaults to the configured one
    #[arg(short = 'd', long)]
    dialect: Option<Dialect>,

    #[command(flatten)]
    config: ConfigFileArgs,
}

impl ModelArgs {
    /// Load the configuration and the model, applying the dialect override.
    pub fn load(&self) -> Result<(QueryCompiler, DynamicModel, Dialect)> {
        let mut config: CompilerConfig = crate::config::load(self.config.path())?;
        if let Some(dialect) = self.dialect {
            config.dialect = dialect;
        }
        let dialect = config.dialect;
        let model: DynamicModel = read_document(&self.model)?;
        tracing::debug!(table = %model.table, fields = model.fields.len(), "loaded model");
        Ok((QueryCompiler::new(Arc::default(), config), model, dialect))
    }
}

/// Read a YAML or JSON document, chosen by file extension.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
    } else {
        serde_saphyr::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))
    }
}
