//! CLI entry point for objcscrape.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// objcscrape: extract and type-resolve Objective-C framework declarations.
#[derive(Parser, Debug)]
#[command(name = "objcscrape", version, about)]
struct Cli {
    /// Path to the objcscrape.toml configuration file.
    #[arg(default_value = "objcscrape.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("objcscrape=info")),
        )
        .init();

    let cli = Cli::parse();
    objcscrape::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
