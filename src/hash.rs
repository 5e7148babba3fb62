// src/hash.rs

//! Content checksums for payloads and published packages
//!
//! The INFO `checksum` field and the repository index `checksum` field are
//! MD5 digests. They identify content and catch corruption in transit; they
//! carry no trust on their own. Trust comes from the detached signature.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Buffer size for streaming file digests (64 KB)
const DIGEST_BUFFER_SIZE: usize = 64 * 1024;

/// Checksum and byte size of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex MD5
    pub checksum: String,
    pub size: u64,
}

/// Incremental MD5 hasher
#[derive(Default)]
pub struct Hasher {
    inner: Md5,
    len: u64,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.len += data.len() as u64;
    }

    pub fn finalize(self) -> FileDigest {
        FileDigest {
            checksum: format!("{:x}", self.inner.finalize()),
            size: self.len,
        }
    }
}

/// MD5 of an in-memory buffer as lowercase hex
pub fn md5(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().checksum
}

/// Stream a reader through MD5
pub fn digest_reader<R: Read>(reader: &mut R) -> io::Result<FileDigest> {
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; DIGEST_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Stream a file through MD5 without loading it into memory
pub fn digest_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    digest_reader(&mut file)
}
