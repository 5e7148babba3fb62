// src/repository/index.rs

//! Repository index builder
//!
//! Produces the JSON package source document:
//!
//! ```json
//! {
//!   "keyrings": ["-----BEGIN PGP PUBLIC KEY BLOCK-----..."],
//!   "packages": [{"package": "acme", "version": "1.0", "checksum": "...", "size": 10240}]
//! }
//! ```
//!
//! Package fields come from each package's INFO, filtered and renamed
//! through a fixed table, followed by caller-declared screenshots and
//! overrides, then the computed link, checksum and size.

use super::client::{FetchOutcome, RepositoryClient};
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::hash;
use crate::spk::archive::OUTPUT_MODE;
use crate::spk::info::PackageInfo;
use crate::spk::inspector;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

/// How an INFO value is carried into the index
#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Text,
    Flag,
}

/// INFO key → index field(s); keys not listed are dropped
const FIELD_MAP: &[(&str, &[&str], FieldKind)] = &[
    ("package", &["package"], FieldKind::Text),
    ("version", &["version"], FieldKind::Text),
    ("maintainer", &["maintainer"], FieldKind::Text),
    ("maintainer_url", &["maintainer_url"], FieldKind::Text),
    ("distributor", &["distributor"], FieldKind::Text),
    ("distributor_url", &["distributor_url"], FieldKind::Text),
    ("displayname", &["dname"], FieldKind::Text),
    ("description", &["desc"], FieldKind::Text),
    ("install_dep_packages", &["deppkgs"], FieldKind::Text),
    ("install_dep_services", &["depsers"], FieldKind::Text),
    ("startable", &["start", "qstart"], FieldKind::Flag),
    ("silent_install", &["qinst"], FieldKind::Flag),
    ("silent_upgrade", &["qupgrade"], FieldKind::Flag),
    ("thirdparty", &["thirdparty"], FieldKind::Flag),
];

/// One package to list in the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReference {
    /// Local package file; with a link this is where the download is cached
    pub file: Option<PathBuf>,
    /// Public download URL, listed verbatim as `link`
    pub link: Option<String>,
    pub thumbnail: Vec<String>,
    pub snapshot: Vec<String>,
    /// Extra fields, overriding anything taken from INFO
    pub info: Vec<(String, String)>,
}

impl PackageReference {
    pub fn local(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::default()
        }
    }

    pub fn remote(link: &str) -> Self {
        Self {
            link: Some(link.to_string()),
            ..Self::default()
        }
    }

    /// Where the package is read from, downloading to it first if linked
    fn local_path(&self, cache_dir: &Path) -> Result<PathBuf> {
        if let Some(file) = &self.file {
            return Ok(file.clone());
        }

        let link = self
            .link
            .as_deref()
            .ok_or_else(|| Error::ConfigError("Package needs a file or a link".to_string()))?;
        let url = url::Url::parse(link)
            .map_err(|e| Error::ConfigError(format!("Invalid package link {link}: {e}")))?;
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::ConfigError(format!("Cannot derive a file name from link {link}"))
            })?;

        Ok(cache_dir.join(name))
    }
}

/// Everything needed to build one index
#[derive(Debug, Clone, Default)]
pub struct IndexSpec {
    /// Output JSON file
    pub index: PathBuf,
    /// ASCII-armored public keyrings, included verbatim
    pub keyrings: Vec<PathBuf>,
    pub packages: Vec<PackageReference>,
    /// Download directory for link-only packages; defaults to the index's directory
    pub cache_dir: Option<PathBuf>,
}

impl IndexSpec {
    pub fn validate(&self) -> Result<()> {
        if self.index.as_os_str().is_empty() {
            return Err(Error::ConfigError("Required attribute missing: index".to_string()));
        }
        for (i, package) in self.packages.iter().enumerate() {
            if package.file.is_none() && package.link.is_none() {
                return Err(Error::ConfigError(format!(
                    "Package #{} needs a file or a link",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    fn cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => self
                .index
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// The index document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryIndex {
    pub keyrings: Vec<String>,
    pub packages: Vec<Map<String, Value>>,
}

impl RepositoryIndex {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::ParseError(format!("Failed to serialize index: {e}")))
    }
}

/// Builds a [`RepositoryIndex`] from an [`IndexSpec`]
pub struct IndexBuilder {
    spec: IndexSpec,
}

impl IndexBuilder {
    pub fn new(spec: IndexSpec) -> Self {
        Self { spec }
    }

    /// Build the index document without writing it
    pub fn build(&self, ctx: &BuildContext) -> Result<RepositoryIndex> {
        let span = info_span!("repository", index = %self.spec.index.display());
        let _guard = span.enter();

        self.spec.validate()?;

        let mut keyrings = Vec::with_capacity(self.spec.keyrings.len());
        for path in &self.spec.keyrings {
            ctx.check()?;
            info!("Include keyring: {}", path.display());
            keyrings.push(read_keyring(path)?);
        }

        let client = if self.spec.packages.iter().any(|p| p.link.is_some()) {
            Some(RepositoryClient::new()?)
        } else {
            None
        };

        let cache_dir = self.spec.cache_dir();
        let mut packages = Vec::with_capacity(self.spec.packages.len());
        for reference in &self.spec.packages {
            ctx.check()?;
            packages.push(package_entry(reference, &cache_dir, client.as_ref())?);
        }

        Ok(RepositoryIndex { keyrings, packages })
    }

    /// Build the index and write it to the configured file
    pub fn write(&self, ctx: &BuildContext) -> Result<RepositoryIndex> {
        let index = self.build(ctx)?;
        ctx.check()?;

        info!("Write Package Source: {}", self.spec.index.display());
        write_json(&index, &self.spec.index)?;
        Ok(index)
    }
}

fn package_entry(
    reference: &PackageReference,
    cache_dir: &Path,
    client: Option<&RepositoryClient>,
) -> Result<Map<String, Value>> {
    let path = reference.local_path(cache_dir)?;
    info!("Include SPK: {}", path.display());

    match (&reference.link, client) {
        (Some(link), Some(client)) => fetch(client, link, &path)?,
        _ => debug!("Using {}", path.display()),
    }

    let mut entry = match inspector::read_info(&path)? {
        Some(info) => remap_info(&info),
        None => {
            warn!("No INFO in {}", path.display());
            Map::new()
        }
    };
    info!(
        "Imported {} fields from SPK: {:?}",
        entry.len(),
        entry.keys().collect::<Vec<_>>()
    );

    if !reference.thumbnail.is_empty() {
        entry.insert("thumbnail".to_string(), string_array(&reference.thumbnail));
    }
    if !reference.snapshot.is_empty() {
        entry.insert("snapshot".to_string(), string_array(&reference.snapshot));
    }
    for (key, value) in &reference.info {
        entry.insert(key.clone(), Value::String(value.clone()));
    }

    if let Some(link) = &reference.link {
        entry.insert("link".to_string(), Value::String(link.clone()));
    }
    let digest = hash::digest_file(&path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    entry.insert("checksum".to_string(), Value::String(digest.checksum));
    entry.insert("size".to_string(), Value::from(digest.size));

    Ok(entry)
}

/// Refresh the cached copy of a linked package
///
/// An unreachable link is tolerated while a local copy exists.
fn fetch(client: &RepositoryClient, link: &str, dest: &Path) -> Result<()> {
    match client.fetch_if_modified(link, dest) {
        Ok(FetchOutcome::Downloaded(size)) => {
            debug!("Fetched {} bytes from {}", size, link);
            Ok(())
        }
        Ok(FetchOutcome::NotModified) => Ok(()),
        Err(e) if dest.is_file() => {
            warn!("{}; using local copy {}", e, dest.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Map INFO fields to index fields through [`FIELD_MAP`]
pub fn remap_info(info: &PackageInfo) -> Map<String, Value> {
    let mut entry = Map::new();
    for (key, value) in info.iter() {
        let Some((_, fields, kind)) = FIELD_MAP.iter().find(|(k, _, _)| *k == key) else {
            continue;
        };
        let value = match kind {
            FieldKind::Text => Value::String(value.to_string()),
            FieldKind::Flag => Value::Bool(parse_truth(value)),
        };
        for field in *fields {
            entry.insert((*field).to_string(), value.clone());
        }
    }
    entry
}

/// `true`, `yes` and `on` (any case) are true, everything else is false
pub fn parse_truth(value: &str) -> bool {
    let value = value.trim();
    ["true", "yes", "on"]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

fn read_keyring(path: &Path) -> Result<String> {
    let data = fs::read(path)
        .map_err(|e| Error::IoError(format!("Failed to read keyring {}: {}", path.display(), e)))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn write_json(index: &RepositoryIndex, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {}", parent.display(), e)))?;

    let temp = tempfile::Builder::new()
        .prefix(".spkit-index-")
        .tempfile_in(parent)
        .map_err(|e| Error::IoError(format!("Failed to create temp file: {e}")))?;

    let mut writer = BufWriter::new(temp);
    writer
        .write_all(index.to_json()?.as_bytes())
        .map_err(|e| Error::IoError(format!("Failed to write index: {e}")))?;
    let temp = writer
        .into_inner()
        .map_err(|e| Error::IoError(format!("Failed to flush index: {}", e.error())))?;

    fs::set_permissions(temp.path(), fs::Permissions::from_mode(OUTPUT_MODE))
        .map_err(|e| Error::IoError(format!("Failed to set permissions on index: {e}")))?;
    temp.persist(dest).map_err(|e| {
        Error::IoError(format!("Failed to move index to {}: {}", dest.display(), e.error))
    })?;
    Ok(())
}
