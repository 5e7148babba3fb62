// src/spk/inspector.rs
//! SPK package inspection
//!
//! Reads built packages: lists their entries and pulls out the INFO
//! manifest. Outer packages are plain tar, but compressed input is
//! detected and accepted too.

use crate::compression::{create_decoder, CompressionFormat};
use crate::error::{Error, Result};
use crate::spk::info::PackageInfo;
use crate::spk::INFO_FILE;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tar::Archive;

/// One entry of a package archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub is_directory: bool,
}

/// Inspected package data
#[derive(Debug, Clone)]
pub struct InspectedPackage {
    pub entries: Vec<PackageEntry>,
    /// Parsed INFO, if the package has one
    pub info: Option<PackageInfo>,
}

impl InspectedPackage {
    /// Load a package from an .spk file
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut archive = open_archive(path)?;
        let mut entries = Vec::new();
        let mut info = None;

        for entry in archive.entries().map_err(|e| read_error(path, e))? {
            let mut entry = entry.map_err(|e| read_error(path, e))?;
            let entry_path = entry_name(&entry).map_err(|e| read_error(path, e))?;
            let header = entry.header();

            entries.push(PackageEntry {
                path: entry_path.clone(),
                size: header.size().unwrap_or(0),
                mode: header.mode().unwrap_or(0),
                is_directory: header.entry_type().is_dir(),
            });

            if entry_path == INFO_FILE {
                let mut text = String::new();
                entry
                    .read_to_string(&mut text)
                    .map_err(|e| read_error(path, e))?;
                info = Some(PackageInfo::parse(&text));
            }
        }

        Ok(Self { entries, info })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }
}

/// Read the raw bytes of one named entry
pub fn read_entry(package: &Path, name: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = open_archive(package)?;

    for entry in archive.entries().map_err(|e| read_error(package, e))? {
        let mut entry = entry.map_err(|e| read_error(package, e))?;
        if entry_name(&entry).map_err(|e| read_error(package, e))? == name {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| read_error(package, e))?;
            return Ok(Some(data));
        }
    }

    Ok(None)
}

/// Parse the INFO manifest of a package, `None` when it has no INFO entry
pub fn read_info(package: &Path) -> Result<Option<PackageInfo>> {
    let Some(data) = read_entry(package, INFO_FILE)? else {
        return Ok(None);
    };
    let text = String::from_utf8(data).map_err(|e| {
        Error::ParseError(format!("INFO in {} is not UTF-8: {}", package.display(), e))
    })?;
    Ok(Some(PackageInfo::parse(&text)))
}

fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open package {}: {}", path.display(), e)))?;

    let mut magic = [0u8; 6];
    let n = read_prefix(&mut file, &mut magic).map_err(|e| read_error(path, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| read_error(path, e))?;

    let format = CompressionFormat::from_magic_bytes(&magic[..n]);
    Ok(Archive::new(create_decoder(file, format)))
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> std::io::Result<String> {
    let path = entry.path()?;
    let name = path.to_string_lossy();
    Ok(name
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string())
}

fn read_error(path: &Path, e: std::io::Error) -> Error {
    Error::IoError(format!("Failed to read package {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spk::archive::write_archive;
    use crate::spk::entry::FileEntry;
    use std::fs;
    use tempfile::TempDir;

    fn build_spk(dir: &Path) -> std::path::PathBuf {
        let info = dir.join("INFO");
        fs::write(&info, "package=\"acme\"\nversion=\"1.0\"\narch=\"noarch\"\n").unwrap();
        let payload = dir.join("package.tgz");
        fs::write(&payload, b"payload").unwrap();

        let spk = dir.join("acme.spk");
        let entries = vec![
            FileEntry::file(&payload, "package.tgz").unwrap(),
            FileEntry::file(&info, "INFO").unwrap(),
        ];
        write_archive(&entries, CompressionFormat::None, &spk).unwrap();
        spk
    }

    #[test]
    fn test_inspect() {
        let temp_dir = TempDir::new().unwrap();
        let spk = build_spk(temp_dir.path());

        let inspected = InspectedPackage::from_file(&spk).unwrap();
        assert_eq!(inspected.entries.len(), 2);
        assert!(inspected.contains("package.tgz"));
        assert_eq!(inspected.entries[0].size, 7);

        let info = inspected.info.unwrap();
        assert_eq!(info.get("package"), Some("acme"));
    }

    #[test]
    fn test_read_entry_and_info() {
        let temp_dir = TempDir::new().unwrap();
        let spk = build_spk(temp_dir.path());

        assert_eq!(read_entry(&spk, "package.tgz").unwrap().unwrap(), b"payload");
        assert!(read_entry(&spk, "syno_signature.asc").unwrap().is_none());
        assert_eq!(read_info(&spk).unwrap().unwrap().get("arch"), Some("noarch"));
    }

    #[test]
    fn test_missing_package() {
        let result = read_info(Path::new("/nonexistent/acme.spk"));
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
