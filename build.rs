// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: build description path
fn description_arg() -> Arg {
    Arg::new("description")
        .required(true)
        .value_name("FILE")
        .help("Build description (TOML)")
}

fn build_cli() -> Command {
    Command::new("spkit")
        .version(env!("CARGO_PKG_VERSION"))
        .author("spkit contributors")
        .about("Build signed SPK packages and repository indexes")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("package")
                .about("Build the package described by a build description")
                .arg(description_arg())
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("SPKIT_PASSWORD")
                        .hide_env_values(true)
                        .help("Passphrase for the signing key, overrides the description"),
                )
                .arg(
                    Arg::new("timestamp_url")
                        .long("timestamp-url")
                        .help("Timestamp authority URL, overrides the description"),
                ),
        )
        .subcommand(
            Command::new("repository")
                .about("Write the repository index described by a build description")
                .arg(description_arg()),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show the entries and INFO of a package")
                .arg(Arg::new("package").required(true).help("Path to the .spk file"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("text")
                        .value_parser(["text", "json"])
                        .help("Output format"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("spkit.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
