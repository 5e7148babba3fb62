// src/spk/entry.rs
//! Archive entries and file sets
//!
//! A [`FileSet`] names a directory tree or a single file plus an optional
//! archive prefix or full path. [`FileSet::entries`] materialises it into an
//! ordered list of [`FileEntry`] values with their archive paths already
//! resolved, so nothing downstream depends on filesystem iteration order.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file or directory destined for an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Where the content is read from
    pub source_path: PathBuf,
    /// Resolved path inside the archive (relative, `/`-separated)
    pub archive_path: String,
    pub is_directory: bool,
}

impl FileEntry {
    /// Entry for a single regular file at an explicit archive path
    pub fn file(source_path: impl Into<PathBuf>, archive_path: &str) -> Result<Self> {
        Ok(Self {
            source_path: source_path.into(),
            archive_path: resolve_archive_path(archive_path, None, None)?,
            is_directory: false,
        })
    }
}

/// Where a file set reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Every file and directory below this root
    Dir(PathBuf),
    /// Exactly one file
    File(PathBuf),
}

/// A selection of files plus the archive path rule applied to them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    pub source: FileSource,
    pub prefix: Option<String>,
    pub fullpath: Option<String>,
}

impl FileSet {
    pub fn dir(root: impl Into<PathBuf>) -> Self {
        Self {
            source: FileSource::Dir(root.into()),
            prefix: None,
            fullpath: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: FileSource::File(path.into()),
            prefix: None,
            fullpath: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn with_fullpath(mut self, fullpath: &str) -> Self {
        self.fullpath = Some(fullpath.to_string());
        self
    }

    /// Materialise the set into entries with resolved archive paths
    ///
    /// Directory trees are walked in file-name order. Directories themselves
    /// are included so their modes survive in the archive.
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        match &self.source {
            FileSource::File(path) => {
                if !path.is_file() {
                    return Err(Error::IoError(format!(
                        "Source file not found: {}",
                        path.display()
                    )));
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(vec![FileEntry {
                    source_path: path.clone(),
                    archive_path: self.resolve(&name)?,
                    is_directory: false,
                }])
            }
            FileSource::Dir(root) => {
                if self.fullpath.is_some() {
                    return Err(Error::ConfigError(format!(
                        "fullpath may only be used with a single file, not directory {}",
                        root.display()
                    )));
                }
                if !root.is_dir() {
                    return Err(Error::IoError(format!(
                        "Source directory not found: {}",
                        root.display()
                    )));
                }

                let mut entries = Vec::new();
                for entry in WalkDir::new(root)
                    .min_depth(1)
                    .follow_links(true)
                    .sort_by_file_name()
                {
                    let entry = entry.map_err(|e| {
                        Error::IoError(format!("Failed to walk {}: {}", root.display(), e))
                    })?;
                    let relative = relative_name(root, entry.path())?;
                    entries.push(FileEntry {
                        source_path: entry.path().to_path_buf(),
                        archive_path: self.resolve(&relative)?,
                        is_directory: entry.file_type().is_dir(),
                    });
                }
                Ok(entries)
            }
        }
    }

    fn resolve(&self, relative: &str) -> Result<String> {
        resolve_archive_path(relative, self.prefix.as_deref(), self.fullpath.as_deref())
    }
}

/// `/`-joined path of `path` below `root`
fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!("{} is outside {}", path.display(), root.display()))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Resolve the archive path for an entry
///
/// An explicit full path wins outright. Otherwise a prefix is joined to the
/// relative path with a single `/`. Otherwise the relative path is used as
/// is. Empty and absolute results are rejected.
pub fn resolve_archive_path(
    relative: &str,
    prefix: Option<&str>,
    fullpath: Option<&str>,
) -> Result<String> {
    check_archive_path(relative)?;

    let resolved = match (fullpath.filter(|f| !f.is_empty()), prefix.filter(|p| !p.is_empty())) {
        (Some(full), _) => full.to_string(),
        (None, Some(prefix)) if prefix.ends_with('/') => format!("{prefix}{relative}"),
        (None, Some(prefix)) => format!("{prefix}/{relative}"),
        (None, None) => relative.to_string(),
    };

    check_archive_path(&resolved)?;
    Ok(resolved)
}

fn check_archive_path(path: &str) -> Result<()> {
    if path.is_empty() || path.starts_with('/') {
        return Err(Error::InvalidPath(format!("{path:?}")));
    }
    Ok(())
}

/// A package icon
///
/// The 64/72 pixel icon (or one without a size) is stored as
/// `PACKAGE_ICON.PNG`; other sizes get their size in the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub file: PathBuf,
    pub size: Option<u32>,
}

impl Icon {
    pub fn archive_name(&self) -> String {
        match self.size {
            None | Some(64) | Some(72) => "PACKAGE_ICON.PNG".to_string(),
            Some(size) => format!("PACKAGE_ICON_{size}.PNG"),
        }
    }

    pub fn file_set(&self) -> FileSet {
        FileSet::file(&self.file).with_fullpath(&self.archive_name())
    }
}
