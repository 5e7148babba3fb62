// src/commands/package.rs

//! Package build command

use super::load_description;
use anyhow::{Context, Result};
use spkit::{BuildContext, PackageBuilder};
use tracing::error;

/// Build the `[package]` of a build description
pub fn cmd_package(
    description: &str,
    password: Option<&str>,
    timestamp_url: Option<&str>,
) -> Result<()> {
    let description = load_description(description)?;
    let mut spec = description
        .package_spec()
        .context("Build description has no [package] table")?;

    if let Some(codesign) = spec.codesign.as_mut() {
        if let Some(password) = password {
            codesign.password = password.to_string();
        }
        if let Some(url) = timestamp_url {
            codesign.timestamp_url = url.to_string();
        }
    }

    let ctx = BuildContext::new();
    let output = PackageBuilder::new(spec).build(&ctx).map_err(|e| {
        error!(category = e.category(), "Package build failed: {}", e);
        e
    })?;

    println!("Built: {}", output.package_path.display());
    println!("  Checksum: {}", output.checksum);
    println!("  Signed: {}", if output.signed { "yes" } else { "no" });
    println!("  Entries: {}", output.entries.len());

    Ok(())
}
