// src/codesign/openpgp.rs

//! OpenPGP detached signatures
//!
//! Produces a binary-document detached signature with one secret key taken
//! from a keyring file, using the sequoia-openpgp library (pure Rust).
//! Content is fed in incrementally, so payload size is not bounded by
//! memory.

use sequoia_openpgp as openpgp;
use openpgp::armor;
use openpgp::cert::prelude::*;
use openpgp::crypto::Password;
use openpgp::packet::key::{SecretParts, UnspecifiedRole};
use openpgp::packet::Key;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Message, Signer};
use openpgp::types::HashAlgorithm;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Digest used for signatures
const SIGNATURE_HASH: HashAlgorithm = HashAlgorithm::SHA256;

/// Signing failures, split by what the operator has to fix
#[derive(Error, Debug)]
pub enum SigningError {
    /// Keyring file missing or unreadable
    #[error("Cannot read keyring {path}: {source}")]
    KeyringUnreadable {
        path: PathBuf,
        source: io::Error,
    },

    /// Keyring file is not OpenPGP key material
    #[error("Invalid keyring {path}: {reason}")]
    KeyringInvalid { path: PathBuf, reason: String },

    #[error("No secret key {0} in keyring")]
    KeyNotFound(String),

    /// Passphrase does not unlock the key
    #[error("Wrong passphrase for key {0}")]
    BadPassphrase(String),

    /// Failure inside the OpenPGP implementation
    #[error("OpenPGP provider failure: {0}")]
    Provider(String),
}

/// Collects the signature packet written by the streaming signer
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> Result<Vec<u8>, SigningError> {
        let mut buf = self
            .0
            .lock()
            .map_err(|_| SigningError::Provider("signature buffer poisoned".to_string()))?;
        Ok(std::mem::take(&mut *buf))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("signature buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A signing session bound to one unlocked secret key
///
/// Created by [`SignatureGenerator::begin`], fed with
/// [`SignatureGenerator::update`] (or through [`Write`]), closed by
/// [`SignatureGenerator::finish`].
pub struct SignatureGenerator {
    signer: Message<'static>,
    sink: SharedBuffer,
    fingerprint: String,
}

impl SignatureGenerator {
    /// Unlock `key_id` from `secring` and start a detached signature
    ///
    /// `key_id` is matched as a hex suffix of the key fingerprint, so a short
    /// id, a long id and a full fingerprint all work. An empty password is
    /// valid and is what unprotected keys need.
    pub fn begin(key_id: &str, secring: &Path, password: &str) -> Result<Self, SigningError> {
        let key = find_secret_key(key_id, secring)?;
        let fingerprint = key.fingerprint().to_hex();

        let key = if key.secret().is_encrypted() {
            key.decrypt_secret(&Password::from(password))
                .map_err(|_| SigningError::BadPassphrase(key_id.to_string()))?
        } else {
            key
        };

        let keypair = key
            .into_keypair()
            .map_err(|e| SigningError::Provider(e.to_string()))?;

        let sink = SharedBuffer::default();
        let message = Message::new(sink.clone());
        let signer = Signer::new(message, keypair)
            .detached()
            .hash_algo(SIGNATURE_HASH)
            .and_then(|s| s.build())
            .map_err(|e| SigningError::Provider(e.to_string()))?;

        info!("GPG: sign with key {}", fingerprint);

        Ok(Self {
            signer,
            sink,
            fingerprint,
        })
    }

    /// Fingerprint of the key actually used
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), SigningError> {
        self.signer
            .write_all(data)
            .map_err(|e| SigningError::Provider(e.to_string()))
    }

    /// Emit the signature, ASCII-armored when asked
    pub fn finish(self, ascii_armor: bool) -> Result<Vec<u8>, SigningError> {
        self.signer
            .finalize()
            .map_err(|e| SigningError::Provider(e.to_string()))?;
        let binary = self.sink.take()?;
        if binary.is_empty() {
            return Err(SigningError::Provider("signer produced no output".to_string()));
        }

        if !ascii_armor {
            return Ok(binary);
        }

        let mut armored = Vec::new();
        let mut writer = armor::Writer::new(&mut armored, armor::Kind::Signature)
            .map_err(|e| SigningError::Provider(e.to_string()))?;
        writer
            .write_all(&binary)
            .map_err(|e| SigningError::Provider(e.to_string()))?;
        writer
            .finalize()
            .map_err(|e| SigningError::Provider(e.to_string()))?;

        Ok(armored)
    }
}

impl Write for SignatureGenerator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.signer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.signer.flush()
    }
}

/// Locate a secret key by id in a keyring file
///
/// If the matching key cannot sign (a certification-only primary key, for
/// instance), the first signing-capable secret key of the same certificate
/// is used instead.
fn find_secret_key(
    key_id: &str,
    secring: &Path,
) -> Result<Key<SecretParts, UnspecifiedRole>, SigningError> {
    let wanted = normalize_key_id(key_id);
    if wanted.is_empty() {
        return Err(SigningError::KeyNotFound(key_id.to_string()));
    }

    let data = fs::read(secring).map_err(|e| SigningError::KeyringUnreadable {
        path: secring.to_path_buf(),
        source: e,
    })?;

    let invalid = |reason: String| SigningError::KeyringInvalid {
        path: secring.to_path_buf(),
        reason,
    };

    let parser = CertParser::from_bytes(&data).map_err(|e| invalid(e.to_string()))?;
    let mut certs = Vec::new();
    for cert in parser {
        certs.push(cert.map_err(|e| invalid(e.to_string()))?);
    }
    if certs.is_empty() {
        return Err(invalid("no certificates found".to_string()));
    }
    debug!("Loaded {} certificate(s) from {}", certs.len(), secring.display());

    let policy = StandardPolicy::new();

    for cert in &certs {
        let Some(matched) = cert
            .keys()
            .secret()
            .find(|ka| ka.key().fingerprint().to_hex().ends_with(&wanted))
        else {
            continue;
        };
        let matched = matched.key().clone();

        let signing: Vec<Key<SecretParts, UnspecifiedRole>> = cert
            .keys()
            .with_policy(&policy, None)
            .secret()
            .for_signing()
            .map(|ka| ka.key().clone())
            .collect();

        let key = signing
            .iter()
            .find(|k| k.fingerprint() == matched.fingerprint())
            .or_else(|| signing.first())
            .cloned()
            .unwrap_or(matched);

        return Ok(key);
    }

    Err(SigningError::KeyNotFound(key_id.to_string()))
}

fn normalize_key_id(key_id: &str) -> String {
    let trimmed = key_id.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}
