// src/spk/archive.rs
//! Tar archive writer
//!
//! Writes an ordered list of [`FileEntry`] values into a tar archive,
//! optionally compressed. Entry names that do not fit a ustar header are
//! carried in a PAX extended header instead of being truncated.
//!
//! The archive is written to a temporary file next to the destination and
//! renamed into place only after the last byte is flushed, so a failed build
//! never leaves a partial archive behind.

use crate::compression::{CompressionFormat, Encoder};
use crate::error::{Error, Result};
use crate::spk::entry::FileEntry;
use std::fs::{self, File, Metadata};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tar::{EntryType, Header};
use tracing::debug;

/// Mode of finished archives, readable by whoever serves them
pub(crate) const OUTPUT_MODE: u32 = 0o644;

/// Write `entries` in order to `dest` as a tar archive
pub fn write_archive(
    entries: &[FileEntry],
    compression: CompressionFormat,
    dest: &Path,
) -> Result<()> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let temp = tempfile::Builder::new()
        .prefix(".spkit-")
        .tempfile_in(parent)
        .map_err(|e| {
            Error::IoError(format!("Failed to create temp file in {}: {}", parent.display(), e))
        })?;

    let encoder = Encoder::new(BufWriter::new(temp), compression);
    let mut archive = tar::Builder::new(encoder);

    for entry in entries {
        append_entry(&mut archive, entry)?;
    }

    let encoder = archive
        .into_inner()
        .map_err(|e| Error::IoError(format!("Failed to finish archive: {e}")))?;
    let temp = encoder
        .finish()?
        .into_inner()
        .map_err(|e| Error::IoError(format!("Failed to flush archive: {}", e.error())))?;

    fs::set_permissions(temp.path(), fs::Permissions::from_mode(OUTPUT_MODE)).map_err(|e| {
        Error::IoError(format!("Failed to set permissions on {}: {}", dest.display(), e))
    })?;
    temp.persist(dest).map_err(|e| {
        Error::IoError(format!("Failed to move archive to {}: {}", dest.display(), e.error))
    })?;

    debug!("Wrote {} entries ({}) to {}", entries.len(), compression, dest.display());
    Ok(())
}

/// Append one entry, keeping its permission bits and modification time
fn append_entry<W: Write>(archive: &mut tar::Builder<W>, entry: &FileEntry) -> Result<()> {
    if entry.archive_path.split('/').any(|c| c == "..") {
        return Err(Error::InvalidPath(entry.archive_path.clone()));
    }

    let metadata = fs::metadata(&entry.source_path).map_err(|e| {
        Error::IoError(format!("Cannot read {}: {}", entry.source_path.display(), e))
    })?;

    let mut header = Header::new_ustar();
    header.set_mode(metadata.permissions().mode() & 0o7777);
    header.set_mtime(mtime_of(&metadata));

    if entry.is_directory {
        let name = format!("{}/", entry.archive_path.trim_end_matches('/'));
        set_entry_path(archive, &mut header, &name)?;
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_cksum();
        archive.append(&header, io::empty())?;
    } else {
        let file = File::open(&entry.source_path).map_err(|e| {
            Error::IoError(format!("Cannot read {}: {}", entry.source_path.display(), e))
        })?;
        set_entry_path(archive, &mut header, &entry.archive_path)?;
        header.set_entry_type(EntryType::Regular);
        header.set_size(metadata.len());
        header.set_cksum();
        archive.append(&header, file).map_err(|e| {
            Error::IoError(format!("Failed to append {}: {}", entry.source_path.display(), e))
        })?;
    }

    Ok(())
}

/// Store `path` in the header, or in a PAX `path` record when it is too long
fn set_entry_path<W: Write>(
    archive: &mut tar::Builder<W>,
    header: &mut Header,
    path: &str,
) -> Result<()> {
    if header.set_path(path).is_ok() {
        return Ok(());
    }

    archive.append_pax_extensions([("path", path.as_bytes())])?;

    // Readers that understand PAX ignore this; others get a recognisable prefix.
    if let Some(ustar) = header.as_ustar_mut() {
        let bytes = path.as_bytes();
        let len = bytes.len().min(ustar.name.len());
        ustar.name = [0; 100];
        ustar.name[..len].copy_from_slice(&bytes[..len]);
        ustar.prefix = [0; 155];
    }
    Ok(())
}

fn mtime_of(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
