// src/spk/info.rs
//! INFO manifest
//!
//! The INFO file is a flat list of `key="value"` lines in insertion order.
//! There is no escaping: a value can not contain a double quote or a line
//! break, and [`PackageInfo::to_text`] refuses to write one.
//!
//! The same grammar is read back by the repository index builder through
//! [`PackageInfo::parse`].

use crate::error::{Error, Result};

/// INFO key holding the package name
pub const NAME_KEY: &str = "package";
/// INFO key holding the package version
pub const VERSION_KEY: &str = "version";
/// INFO key holding the target architecture
pub const ARCH_KEY: &str = "arch";
/// INFO key holding the MD5 of the inner payload
pub const CHECKSUM_KEY: &str = "checksum";

/// Ordered INFO key/value set
///
/// Insertion order is kept. Inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    fields: Vec<(String, String)>,
}

impl PackageInfo {
    /// INFO with the three required keys set, in their canonical order
    pub fn new(name: &str, version: &str, arch: &str) -> Self {
        let mut info = Self::default();
        info.insert(NAME_KEY, name);
        info.insert(VERSION_KEY, version);
        info.insert(ARCH_KEY, arch);
        info
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `<name>-<version>-<arch>`, the base name of the package file
    pub fn package_basename(&self) -> Result<String> {
        let field = |key: &str| {
            self.get(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::ConfigError(format!("Missing required INFO field: {key}")))
        };
        Ok(format!("{}-{}-{}", field(NAME_KEY)?, field(VERSION_KEY)?, field(ARCH_KEY)?))
    }

    /// Serialise as INFO text
    pub fn to_text(&self) -> Result<String> {
        let mut text = String::new();
        for (key, value) in &self.fields {
            if key.is_empty() || key.contains(['=', '"', '\n', '\r']) {
                return Err(Error::ConfigError(format!("Illegal INFO key: {key:?}")));
            }
            if value.contains(['"', '\n', '\r']) {
                return Err(Error::ConfigError(format!(
                    "INFO value for {key} contains a quote or line break, which INFO cannot represent"
                )));
            }
            text.push_str(key);
            text.push_str("=\"");
            text.push_str(value);
            text.push_str("\"\n");
        }
        Ok(text)
    }

    /// Parse INFO text
    ///
    /// Each line is split at its first `=`. Lines without one are skipped.
    /// A value wrapped in double quotes is unwrapped.
    pub fn parse(text: &str) -> Self {
        let mut info = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                &value[1..value.len() - 1]
            } else {
                value
            };
            info.insert(key, value);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_keys_first() {
        let info = PackageInfo::new("acme", "1.0.0-1", "noarch");
        let keys: Vec<&str> = info.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["package", "version", "arch"]);
        assert_eq!(info.package_basename().unwrap(), "acme-1.0.0-1-noarch");
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut info = PackageInfo::new("acme", "1.0", "noarch");
        info.insert("maintainer", "ACME");
        info.insert("version", "2.0");

        let text = info.to_text().unwrap();
        assert_eq!(
            text,
            "package=\"acme\"\nversion=\"2.0\"\narch=\"noarch\"\nmaintainer=\"ACME\"\n"
        );
    }

    #[test]
    fn test_round_trip() {
        let mut info = PackageInfo::new("acme", "1.0.0-1", "x86_64 armv7");
        info.insert("description", "Tool with = signs & spaces");
        info.insert("maintainer_url", "https://example.com/?a=b");
        info.insert(CHECKSUM_KEY, "d41d8cd98f00b204e9800998ecf8427e");
        info.insert("empty", "");

        let parsed = PackageInfo::parse(&info.to_text().unwrap());
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_rejects_quotes_and_newlines() {
        let mut info = PackageInfo::new("acme", "1.0", "noarch");
        info.insert("description", "say \"hi\"");
        assert!(matches!(info.to_text(), Err(Error::ConfigError(_))));

        let mut info = PackageInfo::new("acme", "1.0", "noarch");
        info.insert("description", "two\nlines");
        assert!(matches!(info.to_text(), Err(Error::ConfigError(_))));

        let mut info = PackageInfo::new("acme", "1.0", "noarch");
        info.insert("bad=key", "v");
        assert!(matches!(info.to_text(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_parse_tolerates_malformed_lines() {
        let text = "package=\"acme\"\r\njunk line\n\nversion=1.0\nquote=\"\ndisplayname=\"Acme\"";
        let info = PackageInfo::parse(text);

        assert_eq!(info.get("package"), Some("acme"));
        assert_eq!(info.get("version"), Some("1.0"));
        assert_eq!(info.get("quote"), Some("\""));
        assert_eq!(info.get("displayname"), Some("Acme"));
        assert_eq!(info.len(), 4);
    }

    #[test]
    fn test_missing_required_field() {
        let info = PackageInfo::parse("package=\"acme\"\n");
        assert!(matches!(info.package_basename(), Err(Error::ConfigError(_))));
    }
}
