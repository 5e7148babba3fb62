// src/cli.rs
//! CLI definitions for spkit
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "spkit")]
#[command(author = "spkit contributors")]
#[command(version)]
#[command(about = "Build signed SPK packages and repository indexes", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the package described by a build description
    Package {
        /// Build description (TOML)
        description: String,

        /// Passphrase for the signing key, overrides the description
        #[arg(long, env = "SPKIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Timestamp authority URL, overrides the description
        #[arg(long)]
        timestamp_url: Option<String>,
    },

    /// Write the repository index described by a build description
    Repository {
        /// Build description (TOML)
        description: String,
    },

    /// Show the entries and INFO of a package
    Inspect {
        /// Path to the .spk file
        package: String,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
