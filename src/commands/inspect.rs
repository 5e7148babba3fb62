// src/commands/inspect.rs

//! SPK package inspection

use anyhow::{Context, Result};
use spkit::InspectedPackage;
use std::path::Path;

/// Print the entries and INFO fields of a package
pub fn cmd_inspect(package: &str, format: &str) -> Result<()> {
    let path = Path::new(package);

    if !path.exists() {
        anyhow::bail!("Package not found: {}", package);
    }

    let pkg = InspectedPackage::from_file(path).context("Failed to read SPK package")?;

    match format {
        "json" => {
            let info: serde_json::Map<String, serde_json::Value> = pkg
                .info
                .iter()
                .flat_map(|info| info.iter())
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect();
            let doc = serde_json::json!({
                "entries": pkg.entries,
                "info": info,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        "text" => {
            println!("Package: {}", path.display());
            println!();
            println!("Entries:");
            for entry in &pkg.entries {
                let kind = if entry.is_directory { "d" } else { "-" };
                println!("  {} {:o} {:>10} {}", kind, entry.mode, entry.size, entry.path);
            }

            println!();
            match &pkg.info {
                Some(info) => {
                    println!("INFO:");
                    for (key, value) in info.iter() {
                        println!("  {} = {}", key, value);
                    }
                }
                None => println!("No INFO entry"),
            }
        }
        other => anyhow::bail!("Unknown format: {} (expected text or json)", other),
    }

    Ok(())
}
