// src/spk/package.rs
//! SPK package assembler
//!
//! Drives one package build through its stages:
//!
//! 1. validate the `PackageSpec` (no I/O yet)
//! 2. create the staging directory `<destdir>/<name>-<version>-<arch>/`
//! 3. write the compressed payload `package.tgz` and record its MD5 in INFO
//! 4. write INFO
//! 5. optionally sign the outer entries and store the authority's token
//! 6. write the uncompressed outer archive `<name>-<version>-<arch>.spk`
//! 7. remove the staging directory
//!
//! Step 7 runs on every exit path through [`StagingDir`]'s `Drop`.

use crate::codesign::{CodeSignConfig, CodeSigner};
use crate::compression::CompressionFormat;
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::hash;
use crate::spk::archive::write_archive;
use crate::spk::entry::{FileEntry, FileSet, Icon};
use crate::spk::info::{PackageInfo, CHECKSUM_KEY};
use crate::spk::{
    CONF_PREFIX, INFO_FILE, LICENSE_FILE, PAYLOAD_FILE, SCRIPTS_PREFIX, SIGNATURE_FILE,
    SPK_EXTENSION, WIZARD_PREFIX,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

/// Everything needed to build one package
#[derive(Debug, Clone, Default)]
pub struct PackageSpec {
    /// Output directory for the package and its staging directory
    pub destdir: PathBuf,
    pub name: String,
    pub version: String,
    pub arch: String,
    /// Payload compression; the outer package is never compressed
    pub compression: CompressionFormat,
    /// Extra INFO fields, written after the required ones in this order
    pub info: Vec<(String, String)>,
    pub payload: Vec<FileSet>,
    /// Installer scripts, stored below `scripts/`
    pub scripts: Vec<FileSet>,
    /// Wizard UI files, stored below `WIZARD_UIFILES/`
    pub wizard: Vec<FileSet>,
    /// Configuration files, stored below `conf/`
    pub conf: Vec<FileSet>,
    pub icons: Vec<Icon>,
    /// License text, stored as `LICENSE`
    pub license: Option<PathBuf>,
    /// Signing is skipped when absent
    pub codesign: Option<CodeSignConfig>,
}

impl PackageSpec {
    pub fn new(destdir: impl Into<PathBuf>, name: &str, version: &str, arch: &str) -> Self {
        Self {
            destdir: destdir.into(),
            name: name.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
            ..Self::default()
        }
    }

    /// `<name>-<version>-<arch>`
    pub fn basename(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.arch)
    }

    /// Final package location
    pub fn package_path(&self) -> PathBuf {
        self.destdir
            .join(format!("{}.{}", self.basename(), SPK_EXTENSION))
    }

    fn has_auxiliary(&self) -> bool {
        !self.scripts.is_empty()
            || !self.wizard.is_empty()
            || !self.conf.is_empty()
            || !self.icons.is_empty()
            || self.license.is_some()
    }

    /// Check required attributes and elements before touching the filesystem
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("destdir", self.destdir.as_os_str().is_empty()),
            ("name", self.name.trim().is_empty()),
            ("version", self.version.trim().is_empty()),
            ("arch", self.arch.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(Error::ConfigError(format!(
                "Required attributes missing: {}",
                missing.join(", ")
            )));
        }

        if self.payload.is_empty() {
            return Err(Error::ConfigError("Required element missing: payload".to_string()));
        }
        if !self.has_auxiliary() {
            return Err(Error::ConfigError(
                "Required element missing: scripts (or another auxiliary file)".to_string(),
            ));
        }

        if self.basename().contains('/') {
            return Err(Error::ConfigError(format!(
                "Package name {} must not contain '/'",
                self.basename()
            )));
        }

        Ok(())
    }
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub package_path: PathBuf,
    /// MD5 of the payload, as written to INFO
    pub checksum: String,
    /// Final INFO contents
    pub info: PackageInfo,
    pub signed: bool,
    /// Archive paths of the outer package, in storage order
    pub entries: Vec<String>,
}

/// Staging directory removed on drop
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create the directory if it does not exist yet
    ///
    /// Leftovers of an interrupted build are harmless: the outer archive
    /// only takes the entries this build lists.
    fn create(path: PathBuf) -> Result<Self> {
        if path.exists() {
            debug!("Reusing staging directory {}", path.display());
        }
        fs::create_dir_all(&path).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {}", path.display(), e))
        })?;
        debug!("Created staging directory {}", path.display());
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Cleaned staging directory {}", self.path.display()),
            Err(e) => warn!("Failed to clean {}: {}", self.path.display(), e),
        }
    }
}

/// Builds an SPK from a [`PackageSpec`]
pub struct PackageBuilder {
    spec: PackageSpec,
}

impl PackageBuilder {
    pub fn new(spec: PackageSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &PackageSpec {
        &self.spec
    }

    pub fn build(&self, ctx: &BuildContext) -> Result<BuildOutput> {
        let spec = &self.spec;
        let span = info_span!("package", name = %spec.basename());
        let _guard = span.enter();

        spec.validate()?;

        // File sets are materialised before any output is written so a bad
        // selection fails without leaving anything behind
        let payload_entries = collect_entries(&spec.payload)?;
        if payload_entries.is_empty() {
            return Err(Error::ConfigError("Payload file sets select no files".to_string()));
        }
        let mut outer_entries = self.auxiliary_entries()?;
        if outer_entries.is_empty() {
            return Err(Error::ConfigError(
                "Auxiliary file sets select no files".to_string(),
            ));
        }

        let mut info = PackageInfo::new(&spec.name, &spec.version, &spec.arch);
        for (key, value) in &spec.info {
            info.insert(key, value);
        }
        // Fail on unrepresentable INFO before any I/O
        info.to_text()?;

        ctx.check()?;
        let staging = StagingDir::create(spec.destdir.join(spec.basename()))?;

        ctx.check()?;
        let payload_path = staging.path().join(PAYLOAD_FILE);
        write_archive(&payload_entries, spec.compression, &payload_path)?;
        let digest = hash::digest_file(&payload_path).map_err(|e| {
            Error::IoError(format!("Failed to hash {}: {}", payload_path.display(), e))
        })?;
        info.insert(CHECKSUM_KEY, &digest.checksum);
        info!(
            "Built payload with {} entries ({}, {} bytes, md5 {})",
            payload_entries.len(),
            spec.compression,
            digest.size,
            digest.checksum
        );
        outer_entries.push(FileEntry::file(&payload_path, PAYLOAD_FILE)?);

        ctx.check()?;
        let info_path = staging.path().join(INFO_FILE);
        fs::write(&info_path, info.to_text()?).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {}", info_path.display(), e))
        })?;
        info!("Generating INFO: {}", info_path.display());
        outer_entries.push(FileEntry::file(&info_path, INFO_FILE)?);

        let signed = match &spec.codesign {
            Some(config) => {
                ctx.check()?;
                let token_path = staging.path().join(SIGNATURE_FILE);
                CodeSigner::new(config.clone()).create_token(&outer_entries, &token_path, ctx)?;
                outer_entries.push(FileEntry::file(&token_path, SIGNATURE_FILE)?);
                true
            }
            None => false,
        };

        ctx.check()?;
        let package_path = spec.package_path();
        write_archive(&outer_entries, CompressionFormat::None, &package_path)?;
        info!("Created {}", package_path.display());

        drop(staging);

        Ok(BuildOutput {
            package_path,
            checksum: digest.checksum,
            info,
            signed,
            entries: outer_entries.into_iter().map(|e| e.archive_path).collect(),
        })
    }

    /// Icons, license and the prefixed trees
    fn auxiliary_entries(&self) -> Result<Vec<FileEntry>> {
        let spec = &self.spec;
        let mut entries = Vec::new();

        for icon in &spec.icons {
            entries.extend(icon.file_set().entries()?);
        }
        if let Some(license) = &spec.license {
            entries.extend(FileSet::file(license).with_fullpath(LICENSE_FILE).entries()?);
        }
        for (sets, prefix) in [
            (&spec.scripts, SCRIPTS_PREFIX),
            (&spec.wizard, WIZARD_PREFIX),
            (&spec.conf, CONF_PREFIX),
        ] {
            for set in sets {
                entries.extend(under_prefix(set, prefix).entries()?);
            }
        }

        Ok(entries)
    }
}

/// Place a file set under a fixed archive directory
///
/// The fixed prefix replaces any prefix the caller gave. An explicit
/// `fullpath` still wins and is stored exactly as written.
fn under_prefix(set: &FileSet, prefix: &str) -> FileSet {
    if let Some(own) = set.prefix.as_deref().filter(|p| *p != prefix) {
        warn!("Ignoring prefix {} on a {} file set", own, prefix);
    }
    set.clone().with_prefix(prefix)
}

fn collect_entries(sets: &[FileSet]) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for set in sets {
        entries.extend(set.entries()?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spk::inspector::{read_entry, InspectedPackage};
    use tempfile::TempDir;

    fn fixture(root: &Path) -> PackageSpec {
        let app = root.join("app");
        fs::create_dir_all(app.join("bin")).unwrap();
        fs::write(app.join("bin/acme"), "#!/bin/sh\necho acme\n").unwrap();

        let scripts = root.join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(scripts.join("start-stop-status"), "#!/bin/sh\nexit 0\n").unwrap();

        let mut spec = PackageSpec::new(root.join("dist"), "acme", "1.0.0-1", "noarch");
        spec.payload.push(FileSet::dir(&app));
        spec.scripts.push(FileSet::dir(&scripts));
        spec
    }

    #[test]
    fn test_validate_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let mut spec = fixture(temp_dir.path());
        spec.version.clear();
        spec.arch.clear();

        let err = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap_err();
        match err {
            Error::ConfigError(msg) => {
                assert!(msg.contains("version"));
                assert!(msg.contains("arch"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp_dir.path().join("dist").exists());
    }

    #[test]
    fn test_requires_payload_and_auxiliary() {
        let temp_dir = TempDir::new().unwrap();
        let mut spec = fixture(temp_dir.path());
        spec.scripts.clear();
        assert!(matches!(spec.validate(), Err(Error::ConfigError(_))));

        let mut spec = fixture(temp_dir.path());
        spec.payload.clear();
        assert!(matches!(spec.validate(), Err(Error::ConfigError(_))));

        let mut spec = fixture(temp_dir.path());
        spec.scripts.clear();
        spec.icons.push(Icon {
            file: temp_dir.path().join("icon.png"),
            size: None,
        });
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_build_unsigned() {
        let temp_dir = TempDir::new().unwrap();
        let spec = fixture(temp_dir.path());
        let dist = spec.destdir.clone();

        let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();

        assert_eq!(output.package_path, dist.join("acme-1.0.0-1-noarch.spk"));
        assert!(!output.signed);
        assert!(!dist.join("acme-1.0.0-1-noarch").exists());

        let inspected = InspectedPackage::from_file(&output.package_path).unwrap();
        assert!(inspected.contains("package.tgz"));
        assert!(inspected.contains("INFO"));
        assert!(inspected.contains("scripts/start-stop-status"));
        assert!(!inspected.contains("syno_signature.asc"));

        let info = inspected.info.unwrap();
        let payload = read_entry(&output.package_path, "package.tgz").unwrap().unwrap();
        assert_eq!(info.get("checksum"), Some(hash::md5(&payload).as_str()));
        assert_eq!(info.get("checksum"), Some(output.checksum.as_str()));
    }

    #[test]
    fn test_info_order_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let mut spec = fixture(temp_dir.path());
        spec.info.push(("displayname".to_string(), "ACME".to_string()));
        spec.info.push(("version".to_string(), "1.0.0-1".to_string()));

        let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
        let keys: Vec<&str> = output.info.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["package", "version", "arch", "displayname", "checksum"]);
    }

    #[test]
    fn test_auxiliary_layout() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut spec = fixture(root);

        fs::write(root.join("icon72.png"), b"png").unwrap();
        fs::write(root.join("icon256.png"), b"png").unwrap();
        fs::write(root.join("LICENSE.txt"), b"MIT").unwrap();
        fs::create_dir_all(root.join("wizard")).unwrap();
        fs::write(root.join("wizard/install_uifile"), b"[]").unwrap();
        fs::write(root.join("privilege.json"), b"{}").unwrap();
        fs::write(root.join("resource.json"), b"{}").unwrap();

        spec.icons.push(Icon { file: root.join("icon72.png"), size: Some(72) });
        spec.icons.push(Icon { file: root.join("icon256.png"), size: Some(256) });
        spec.license = Some(root.join("LICENSE.txt"));
        spec.wizard.push(FileSet::dir(root.join("wizard")));
        spec.conf.push(FileSet::file(root.join("privilege.json")).with_fullpath("conf/privilege"));
        spec.conf.push(FileSet::file(root.join("resource.json")).with_fullpath("resource"));

        let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
        for path in [
            "PACKAGE_ICON.PNG",
            "PACKAGE_ICON_256.PNG",
            "LICENSE",
            "WIZARD_UIFILES/install_uifile",
            "conf/privilege",
            "resource",
        ] {
            assert!(output.entries.iter().any(|e| e == path), "missing {path}");
        }
        assert!(!output.entries.iter().any(|e| e == "conf/resource"));
    }

    #[test]
    fn test_xz_payload_keeps_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut spec = fixture(temp_dir.path());
        spec.compression = CompressionFormat::Xz;

        let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
        let payload = read_entry(&output.package_path, PAYLOAD_FILE).unwrap().unwrap();
        assert_eq!(CompressionFormat::from_magic_bytes(&payload), CompressionFormat::Xz);
    }

    #[test]
    fn test_staging_cleaned_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut spec = fixture(temp_dir.path());
        spec.codesign = Some(CodeSignConfig::new("ABCD", temp_dir.path().join("missing.pgp")));
        let dist = spec.destdir.clone();

        let result = PackageBuilder::new(spec).build(&BuildContext::new());
        assert!(matches!(result, Err(Error::Signing(_))));
        assert!(!dist.join("acme-1.0.0-1-noarch").exists());
        assert!(!dist.join("acme-1.0.0-1-noarch.spk").exists());
    }

    #[test]
    fn test_existing_staging_reused() {
        let temp_dir = TempDir::new().unwrap();
        let spec = fixture(temp_dir.path());
        let stale = spec.destdir.join(spec.basename());
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover"), b"x").unwrap();

        let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
        assert!(!output.entries.iter().any(|e| e.contains("leftover")));
        assert!(!stale.exists());
    }

    #[test]
    fn test_cancelled_build() {
        let temp_dir = TempDir::new().unwrap();
        let spec = fixture(temp_dir.path());
        let ctx = BuildContext::new();
        ctx.cancel();

        let result = PackageBuilder::new(spec).build(&ctx);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_under_prefix() {
        let set = under_prefix(&FileSet::dir("/s"), SCRIPTS_PREFIX);
        assert_eq!(set.prefix.as_deref(), Some("scripts"));

        let set = under_prefix(&FileSet::dir("/s").with_prefix("lib/"), SCRIPTS_PREFIX);
        assert_eq!(set.prefix.as_deref(), Some("scripts"));

        let set = under_prefix(&FileSet::file("/c").with_fullpath("resource"), CONF_PREFIX);
        assert_eq!(set.fullpath.as_deref(), Some("resource"));
        assert_eq!(set.prefix.as_deref(), Some("conf"));
    }
}
