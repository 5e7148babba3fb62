// src/spk/mod.rs

//! SPK package format
//!
//! An SPK is an uncompressed tar archive holding:
//! - `package.tgz`: the compressed payload tree
//! - `INFO`: the `key="value"` manifest
//! - optional `PACKAGE_ICON*.PNG`, `LICENSE`, and `scripts/`,
//!   `WIZARD_UIFILES/`, `conf/` trees
//! - optional `syno_signature.asc`: the timestamp authority's token
//!
//! Building goes through [`PackageBuilder`]; reading through [`inspector`].

pub mod archive;
pub mod entry;
pub mod info;
pub mod inspector;
pub mod order;
pub mod package;

pub use archive::write_archive;
pub use entry::{FileEntry, FileSet, FileSource, Icon};
pub use info::PackageInfo;
pub use inspector::InspectedPackage;
pub use package::{BuildOutput, PackageBuilder, PackageSpec};

/// Manifest entry name
pub const INFO_FILE: &str = "INFO";

/// Signature token entry name
pub const SIGNATURE_FILE: &str = "syno_signature.asc";

/// Payload entry name, kept even for xz payloads
pub const PAYLOAD_FILE: &str = "package.tgz";

/// License entry name
pub const LICENSE_FILE: &str = "LICENSE";

/// Package file extension
pub const SPK_EXTENSION: &str = "spk";

/// Archive prefix of installer scripts
pub const SCRIPTS_PREFIX: &str = "scripts";

/// Archive prefix of wizard UI files
pub const WIZARD_PREFIX: &str = "WIZARD_UIFILES";

/// Archive prefix of configuration files
pub const CONF_PREFIX: &str = "conf";
