use anyhow::Result;
use clap::{Parser, Subcommand};

mod common;
mod config;
mod explain;
mod logging;
mod sanitize;

/// Explain how structured CRUD requests compile to SQL
#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(name = "crudspec")]
struct Cli {
    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a request against a model and print the SQL
    Explain(explain::ExplainArgs),
    /// Qualify a raw WHERE expression against a model
    Sanitize(sanitize::SanitizeArgs),
    /// Print the effective compiler configuration
    Config(config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Explain(args) => args.run(),
        Commands::Sanitize(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
