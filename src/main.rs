// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Package {
            description,
            password,
            timestamp_url,
        } => commands::cmd_package(&description, password.as_deref(), timestamp_url.as_deref()),

        Commands::Repository { description } => commands::cmd_repository(&description),

        Commands::Inspect { package, format } => commands::cmd_inspect(&package, &format),

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "spkit", &mut std::io::stdout());
            Ok(())
        }
    }
}
