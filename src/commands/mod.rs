// src/commands/mod.rs
//! Command handlers for the spkit CLI

mod inspect;
mod package;
mod repository;

pub use inspect::cmd_inspect;
pub use package::cmd_package;
pub use repository::cmd_repository;

use anyhow::{Context, Result};
use spkit::config::BuildDescription;
use std::path::Path;

/// Load a build description, failing with the file name in the message
fn load_description(path: &str) -> Result<BuildDescription> {
    let path = Path::new(path);
    if !path.exists() {
        anyhow::bail!("Build description not found: {}", path.display());
    }
    BuildDescription::from_file(path)
        .with_context(|| format!("Failed to load build description {}", path.display()))
}
