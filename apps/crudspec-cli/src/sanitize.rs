use anyhow::Result;
use clap::Args;

use crate::common::ModelArgs;

#[derive(Args)]
pub struct SanitizeArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Raw WHERE expression
    expr: String,
}

impl SanitizeArgs {
    pub fn run(&self) -> Result<()> {
        let (compiler, model, _) = self.model.load()?;
        let sanitized = compiler.sanitize_where(&model, &self.expr)?;
        println!("{sanitized}");
        Ok(())
    }
}
