// src/commands/repository.rs

//! Repository index command

use super::load_description;
use anyhow::{Context, Result};
use spkit::{BuildContext, IndexBuilder};
use tracing::error;

/// Write the index for the `[repository]` of a build description
pub fn cmd_repository(description: &str) -> Result<()> {
    let description = load_description(description)?;
    let spec = description
        .index_spec()
        .context("Build description has no [repository] table")?;
    let index_path = spec.index.clone();

    let ctx = BuildContext::new();
    let index = IndexBuilder::new(spec).write(&ctx).map_err(|e| {
        error!(category = e.category(), "Index build failed: {}", e);
        e
    })?;

    println!("Wrote: {}", index_path.display());
    println!("  Packages: {}", index.packages.len());
    println!("  Keyrings: {}", index.keyrings.len());

    Ok(())
}
