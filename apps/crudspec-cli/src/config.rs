use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use crudspec_db::CompilerConfig;
use crudspec_db::config::CONFIG_SECTION;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};

use crate::common::ConfigFileArgs;

/// Environment prefix; `CRUDSPEC__LIMITS__MAX=200` maps to `crudspec.limits.max`.
const ENV_PREFIX: &str = "CRUDSPEC__";

/// Layered configuration: defaults, then the YAML file, then the environment.
pub fn load(path: Option<&Path>) -> Result<CompilerConfig> {
    let mut figment = Figment::new().merge(Serialized::default(
        CONFIG_SECTION,
        CompilerConfig::default(),
    ));
    if let Some(path) = path {
        if !path.is_file() {
            anyhow::bail!("config file does not exist: {}", path.display());
        }
        figment = figment.merge(Yaml::file(path));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").map(|key| {
        format!("{CONFIG_SECTION}.{}", key.as_str()).into()
    }));

    CompilerConfig::from_figment(&figment).context("invalid compiler configuration")
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    config: ConfigFileArgs,
}

impl ConfigArgs {
    pub fn run(&self) -> Result<()> {
        let config = load(self.config.path())?;
        let rendered = serde_json::to_string_pretty(&serde_json::json!({ CONFIG_SECTION: config }))?;
        println!("{rendered}");
        Ok(())
    }
}
