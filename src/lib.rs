// src/lib.rs

//! spkit: SPK package builder
//!
//! Builds signed SPK packages and the JSON repository index that lists them.
//!
//! # Architecture
//!
//! - Packages: a compressed payload, an INFO manifest and auxiliary files in
//!   an uncompressed tar
//! - Signing: an OpenPGP detached signature over the package content in
//!   byte-wise path order, co-signed by a timestamp authority whose token is
//!   stored in the package
//! - Index: INFO fields of published packages, remapped and merged with
//!   checksums, sizes and download links
//! - Explicit context: cancellation travels in a [`BuildContext`] argument,
//!   never in global state

pub mod codesign;
pub mod compression;
pub mod config;
pub mod context;
mod error;
pub mod hash;
pub mod repository;
pub mod spk;

pub use codesign::{CodeSignConfig, CodeSigner, SignatureGenerator, SigningError};
pub use compression::CompressionFormat;
pub use config::BuildDescription;
pub use context::BuildContext;
pub use error::{Error, Result};
pub use repository::{IndexBuilder, IndexSpec, PackageReference, RepositoryIndex};
pub use spk::{
    BuildOutput, FileEntry, FileSet, Icon, InspectedPackage, PackageBuilder, PackageInfo,
    PackageSpec,
};
