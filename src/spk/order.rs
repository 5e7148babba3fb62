// src/spk/order.rs
//! Canonical content order for signing
//!
//! The detached signature covers the concatenated content of every file in
//! the outer package, taken in byte-wise ascending order of archive path.
//! A verifier rebuilds the same byte stream from the archive alone, so the
//! order must not depend on declaration order or on the filesystem.

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::spk::entry::FileEntry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use tracing::warn;

/// Read buffer for streaming signed content (64 KB)
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Sort file entries by archive path, byte-wise
///
/// Directory entries carry no content and are left out. Archive paths are
/// validated again here; an entry that claims the same path as an earlier
/// one replaces it, matching what an extracting reader would end up with.
pub fn signing_order(entries: &[FileEntry]) -> Result<Vec<FileEntry>> {
    let mut sorted: BTreeMap<&str, &FileEntry> = BTreeMap::new();

    for entry in entries {
        let path = entry.archive_path.as_str();
        if path.is_empty() || path.starts_with('/') {
            return Err(Error::InvalidPath(format!("{path:?}")));
        }
        if entry.is_directory {
            continue;
        }
        if sorted.insert(path, entry).is_some() {
            warn!("Duplicate archive entry {}, last one wins", path);
        }
    }

    Ok(sorted.into_values().cloned().collect())
}

/// Stream the content of `ordered` into `out`, returning the byte count
pub fn copy_ordered<W: Write>(
    ordered: &[FileEntry],
    out: &mut W,
    ctx: &BuildContext,
) -> Result<u64> {
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
    let mut total = 0u64;

    for entry in ordered {
        ctx.check()?;

        let mut file = File::open(&entry.source_path).map_err(|e| {
            Error::IoError(format!("Cannot read {}: {}", entry.source_path.display(), e))
        })?;

        loop {
            let n = file.read(&mut buffer).map_err(|e| {
                Error::IoError(format!("Cannot read {}: {}", entry.source_path.display(), e))
            })?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
            total += n as u64;
        }
    }

    Ok(total)
}
