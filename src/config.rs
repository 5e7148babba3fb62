// src/config.rs
//! Build description files
//!
//! A build description is a TOML file with a `[package]` table, a
//! `[repository]` table, or both:
//!
//! ```toml
//! [package]
//! name = "acme"
//! version = "1.0.0-1"
//! arch = "noarch"
//! destdir = "dist"
//!
//! [[package.info]]
//! name = "displayname"
//! value = "ACME"
//!
//! [[package.payload]]
//! dir = "build/app"
//!
//! [[package.scripts]]
//! dir = "spk/scripts"
//!
//! [package.codesign]
//! key_id = "4E402EBF7C3C6A71"
//! secring = "keys/secring.pgp"
//!
//! [repository]
//! index = "dist/index.json"
//! keyrings = ["keys/pubring.asc"]
//!
//! [[repository.spk]]
//! file = "dist/acme-1.0.0-1-noarch.spk"
//! link = "https://example.com/acme-1.0.0-1-noarch.spk"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::codesign::{CodeSignConfig, DEFAULT_TIMESTAMP_URL};
use crate::compression::CompressionFormat;
use crate::error::Error;
use crate::repository::{IndexSpec, PackageReference};
use crate::spk::{FileSet, Icon, PackageSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("Failed to read build description: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse build description: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid build description: {0}")]
    Invalid(String),
}

impl From<DescriptionError> for Error {
    fn from(e: DescriptionError) -> Self {
        Error::ConfigError(e.to_string())
    }
}

/// Root structure of a build description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDescription {
    #[serde(default)]
    pub package: Option<PackageSection>,

    #[serde(default)]
    pub repository: Option<RepositorySection>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// `[package]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub destdir: PathBuf,

    /// Payload compression (none, gzip, xz)
    #[serde(default)]
    pub compression: CompressionFormat,

    /// License text file
    #[serde(default)]
    pub license: Option<PathBuf>,

    /// Extra INFO fields, in order
    #[serde(default)]
    pub info: Vec<InfoField>,

    #[serde(default)]
    pub payload: Vec<FileSetConfig>,
    #[serde(default)]
    pub scripts: Vec<FileSetConfig>,
    #[serde(default)]
    pub wizard: Vec<FileSetConfig>,
    #[serde(default)]
    pub conf: Vec<FileSetConfig>,

    #[serde(default)]
    pub icon: Vec<IconConfig>,

    #[serde(default)]
    pub codesign: Option<CodeSignSection>,
}

/// `name`/`value` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfoField {
    pub name: String,
    pub value: String,
}

/// A directory tree or a single file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSetConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Archive directory the files are placed under
    #[serde(default)]
    pub prefix: Option<String>,
    /// Exact archive path (single files only)
    #[serde(default)]
    pub fullpath: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IconConfig {
    pub file: PathBuf,
    #[serde(default)]
    pub size: Option<u32>,
}

/// `[package.codesign]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeSignSection {
    pub key_id: String,
    pub secring: PathBuf,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timestamp_url")]
    pub timestamp: String,
}

fn default_timestamp_url() -> String {
    DEFAULT_TIMESTAMP_URL.to_string()
}

/// `[repository]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositorySection {
    #[serde(default)]
    pub index: PathBuf,
    #[serde(default)]
    pub keyrings: Vec<PathBuf>,
    /// Download directory for packages given only by link
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub spk: Vec<SpkConfig>,
}

/// `[[repository.spk]]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpkConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub thumbnail: Vec<String>,
    #[serde(default)]
    pub snapshot: Vec<String>,
    #[serde(default)]
    pub info: Vec<InfoField>,
}

impl BuildDescription {
    /// Load a description, resolving relative paths against its directory
    pub fn from_file(path: &Path) -> Result<Self, DescriptionError> {
        let content = std::fs::read_to_string(path)?;
        let mut description = Self::parse(&content)?;
        description.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(description)
    }

    /// Parse a description from a TOML string
    pub fn parse(content: &str) -> Result<Self, DescriptionError> {
        let description: BuildDescription = toml::from_str(content)?;
        description.validate()?;
        Ok(description)
    }

    /// Structural checks; attribute checks happen when the build starts
    pub fn validate(&self) -> Result<(), DescriptionError> {
        if self.package.is_none() && self.repository.is_none() {
            return Err(DescriptionError::MissingField(
                "[package] or [repository]".to_string(),
            ));
        }

        if let Some(package) = &self.package {
            let groups = [
                ("package.payload", &package.payload),
                ("package.scripts", &package.scripts),
                ("package.wizard", &package.wizard),
                ("package.conf", &package.conf),
            ];
            for (group, sets) in groups {
                for set in sets {
                    set.validate(group)?;
                }
            }
            if let Some(codesign) = &package.codesign {
                if codesign.key_id.trim().is_empty() {
                    return Err(DescriptionError::MissingField(
                        "package.codesign.key_id".to_string(),
                    ));
                }
            }
        }

        if let Some(repository) = &self.repository {
            if repository.index.as_os_str().is_empty() {
                return Err(DescriptionError::MissingField("repository.index".to_string()));
            }
            for spk in &repository.spk {
                if spk.file.is_none() && spk.link.is_none() {
                    return Err(DescriptionError::Invalid(
                        "repository.spk needs a file or a link".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// The `[package]` table as a package build
    pub fn package_spec(&self) -> Result<PackageSpec, DescriptionError> {
        let section = self
            .package
            .as_ref()
            .ok_or_else(|| DescriptionError::MissingField("[package]".to_string()))?;

        let file_sets = |sets: &[FileSetConfig]| -> Vec<FileSet> {
            sets.iter().map(|s| s.to_file_set(self)).collect()
        };

        Ok(PackageSpec {
            destdir: if section.destdir.as_os_str().is_empty() {
                PathBuf::new()
            } else {
                self.resolve(&section.destdir)
            },
            name: section.name.clone(),
            version: section.version.clone(),
            arch: section.arch.clone(),
            compression: section.compression,
            info: section
                .info
                .iter()
                .map(|f| (f.name.clone(), f.value.clone()))
                .collect(),
            payload: file_sets(&section.payload),
            scripts: file_sets(&section.scripts),
            wizard: file_sets(&section.wizard),
            conf: file_sets(&section.conf),
            icons: section
                .icon
                .iter()
                .map(|i| Icon {
                    file: self.resolve(&i.file),
                    size: i.size,
                })
                .collect(),
            license: section.license.as_deref().map(|p| self.resolve(p)),
            codesign: section.codesign.as_ref().map(|c| {
                CodeSignConfig::new(&c.key_id, self.resolve(&c.secring))
                    .with_password(&c.password)
                    .with_timestamp_url(&c.timestamp)
            }),
        })
    }

    /// The `[repository]` table as an index build
    pub fn index_spec(&self) -> Result<IndexSpec, DescriptionError> {
        let section = self
            .repository
            .as_ref()
            .ok_or_else(|| DescriptionError::MissingField("[repository]".to_string()))?;

        Ok(IndexSpec {
            index: self.resolve(&section.index),
            keyrings: section.keyrings.iter().map(|k| self.resolve(k)).collect(),
            cache_dir: section.cache_dir.as_deref().map(|d| self.resolve(d)),
            packages: section
                .spk
                .iter()
                .map(|spk| PackageReference {
                    file: spk.file.as_deref().map(|f| self.resolve(f)),
                    link: spk.link.clone(),
                    thumbnail: spk.thumbnail.clone(),
                    snapshot: spk.snapshot.clone(),
                    info: spk
                        .info
                        .iter()
                        .map(|f| (f.name.clone(), f.value.clone()))
                        .collect(),
                })
                .collect(),
        })
    }
}

impl FileSetConfig {
    fn validate(&self, group: &str) -> Result<(), DescriptionError> {
        match (&self.dir, &self.file) {
            (Some(_), Some(_)) => Err(DescriptionError::Invalid(format!(
                "{group}: use either dir or file, not both"
            ))),
            (None, None) => Err(DescriptionError::MissingField(format!("{group}.dir or {group}.file"))),
            (Some(_), None) if self.fullpath.is_some() => Err(DescriptionError::Invalid(format!(
                "{group}: fullpath requires file"
            ))),
            _ => Ok(()),
        }
    }

    fn to_file_set(&self, description: &BuildDescription) -> FileSet {
        let mut set = match (&self.dir, &self.file) {
            (Some(dir), _) => FileSet::dir(description.resolve(dir)),
            (None, Some(file)) => FileSet::file(description.resolve(file)),
            (None, None) => FileSet::dir(&description.base_dir),
        };
        set.prefix = self.prefix.clone();
        set.fullpath = self.fullpath.clone();
        set
    }
}
