// src/repository/mod.rs

//! Package repository index
//!
//! This module provides functionality for:
//! - Fetching published packages with conditional (timestamp) downloads
//! - Reading INFO out of built packages and mapping it to index fields
//! - Writing the JSON package source document with its trusted keyrings

mod client;
mod index;

pub use client::{FetchOutcome, RepositoryClient};
pub use index::{
    parse_truth, remap_info, IndexBuilder, IndexSpec, PackageReference, RepositoryIndex,
};
