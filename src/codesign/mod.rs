// src/codesign/mod.rs
//! Package code signing
//!
//! Signing an SPK is a two-party affair:
//! - the builder computes an OpenPGP detached signature over the package
//!   content in canonical order ([`crate::spk::order`])
//! - the timestamp authority receives that signature and answers with the
//!   token that actually ships inside the package
//!
//! [`CodeSigner`] runs both steps and writes the token file.

pub mod openpgp;
pub mod timestamp;

pub use openpgp::{SignatureGenerator, SigningError};
pub use timestamp::{TimestampClient, DEFAULT_TIMESTAMP_URL};

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::spk::entry::FileEntry;
use crate::spk::order::{copy_ordered, signing_order};
use crate::spk::SIGNATURE_FILE;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Signing key and authority settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSignConfig {
    pub key_id: String,
    /// Secret keyring holding the key
    pub secring: PathBuf,
    /// Passphrase; empty for unprotected keys
    pub password: String,
    /// Timestamp authority endpoint
    pub timestamp_url: String,
}

impl CodeSignConfig {
    pub fn new(key_id: &str, secring: impl Into<PathBuf>) -> Self {
        Self {
            key_id: key_id.to_string(),
            secring: secring.into(),
            password: String::new(),
            timestamp_url: DEFAULT_TIMESTAMP_URL.to_string(),
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn with_timestamp_url(mut self, url: &str) -> Self {
        self.timestamp_url = url.to_string();
        self
    }
}

/// Signs a set of package entries and fetches the matching token
pub struct CodeSigner {
    config: CodeSignConfig,
}

impl CodeSigner {
    pub fn new(config: CodeSignConfig) -> Self {
        Self { config }
    }

    /// Armored detached signature over `entries` in canonical order
    pub fn sign_entries(&self, entries: &[FileEntry], ctx: &BuildContext) -> Result<Vec<u8>> {
        let ordered = signing_order(entries)?;

        let mut generator = SignatureGenerator::begin(
            &self.config.key_id,
            &self.config.secring,
            &self.config.password,
        )?;
        let signed = copy_ordered(&ordered, &mut generator, ctx)?;
        debug!("Signed {} bytes across {} entries", signed, ordered.len());

        Ok(generator.finish(true)?)
    }

    /// Sign `entries`, co-sign with the authority and write the token to `token_path`
    pub fn create_token(
        &self,
        entries: &[FileEntry],
        token_path: &Path,
        ctx: &BuildContext,
    ) -> Result<()> {
        // Fail on a bad endpoint before doing any signing work
        let client = TimestampClient::new(&self.config.timestamp_url)?;

        let signature = self.sign_entries(entries, ctx)?;
        ctx.check()?;

        let token = client.submit(&signature, SIGNATURE_FILE)?;
        fs::write(token_path, &token).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {}", token_path.display(), e))
        })?;

        Ok(())
    }
}
