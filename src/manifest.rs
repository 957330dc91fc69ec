// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Manifest Module
//!
//! A manifest is the ordered list of output-relative paths one generation
//! run produced. It is the unit of deploy and undeploy.
//!
//! ## Invariants
//!
//! - Entries are unique; insertion order is preserved.
//! - Entries use `/` separators, are relative, and never contain `.`,
//!   `..` or empty components.
//! - On disk, one entry per line, UTF-8, no blank lines.
//!
//! ## Example
//!
//! ```rust
//! use webgen::manifest::Manifest;
//!
//! let mut manifest = Manifest::new();
//! assert!(manifest.insert("index.html").unwrap());
//! assert!(!manifest.insert("index.html").unwrap());
//! assert!(manifest.insert("../etc/passwd").is_err());
//! assert_eq!(manifest.to_text(), "index.html\n");
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::core::error::{Result, WebgenError};
use crate::fsutil;

/// Ordered, duplicate-free set of output-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`. Returns `false` when it was already present.
    pub fn insert<S: Into<String>>(&mut self, entry: S) -> Result<bool> {
        let entry = entry.into();
        validate_entry(&entry).map_err(|message| {
            WebgenError::InvalidManifest {
                path: PathBuf::new(),
                line: self.entries.len() + 1,
                message,
            }
        })?;
        if !self.seen.insert(entry.clone()) {
            return Ok(false);
        }
        self.entries.push(entry);
        Ok(true)
    }

    /// Appends a relative filesystem path, converting separators.
    pub fn insert_path(&mut self, path: &Path) -> Result<bool> {
        let entry = entry_for(path).ok_or_else(|| {
            WebgenError::InvalidManifest {
                path: PathBuf::new(),
                line: self.entries.len() + 1,
                message: format!(
                    "`{}` is not a relative UTF-8 path",
                    path.display()
                ),
            }
        })?;
        self.insert(entry)
    }

    /// Removes `entry`. Returns whether it was listed.
    pub fn remove(&mut self, entry: &str) -> bool {
        if !self.seen.remove(entry) {
            return false;
        }
        self.entries.retain(|e| e != entry);
        true
    }

    /// Whether `entry` is listed.
    pub fn contains(&self, entry: &str) -> bool {
        self.seen.contains(entry)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of `self` that are absent from `other`, in order.
    pub fn difference<'a>(&'a self, other: &Manifest) -> Vec<&'a str> {
        self.iter().filter(|e| !other.contains(e)).collect()
    }

    /// Parses manifest text. `path` names the source in errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut manifest = Manifest::new();
        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            validate_entry(line).map_err(|message| {
                WebgenError::InvalidManifest {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message,
                }
            })?;
            if manifest.seen.insert(line.to_string()) {
                manifest.entries.push(line.to_string());
            }
        }
        Ok(manifest)
    }

    /// Reads a manifest file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| WebgenError::io_error(path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| {
            let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
            WebgenError::InvalidManifest {
                path: path.to_path_buf(),
                line: valid.iter().filter(|b| **b == b'\n').count() + 1,
                message: "entry is not valid UTF-8".to_string(),
            }
        })?;
        Self::parse(&text, path)
    }

    /// Reads a manifest file, treating a missing file as empty.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(WebgenError::IOError { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Ok(Self::new())
            }
            other => other,
        }
    }

    /// Serialises to one entry per line.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(
            self.entries.iter().map(|e| e.len() + 1).sum(),
        );
        for entry in &self.entries {
            text.push_str(entry);
            text.push('\n');
        }
        text
    }

    /// Atomically writes the manifest to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fsutil::write_atomic(path, self.to_text().as_bytes())
    }

    /// Resolves `entry` below `root`.
    pub fn resolve(root: &Path, entry: &str) -> PathBuf {
        entry.split('/').fold(root.to_path_buf(), |p, c| p.join(c))
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Converts a relative path into a manifest entry.
pub fn entry_for(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn validate_entry(entry: &str) -> std::result::Result<(), String> {
    if entry.is_empty() {
        return Err("empty entry".to_string());
    }
    if entry.starts_with('/') || entry.starts_with('\\') {
        return Err(format!("`{}` is absolute", entry));
    }
    if entry.contains('\\') || entry.contains('\r') || entry.contains('\0') {
        return Err(format!("`{}` contains a forbidden character", entry));
    }
    for part in entry.split('/') {
        match part {
            "" => return Err(format!("`{}` has an empty component", entry)),
            "." | ".." => {
                return Err(format!("`{}` escapes the output root", entry))
            }
            _ if cfg!(windows) && part.contains(':') => {
                return Err(format!("`{}` is absolute", entry))
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_keeps_order_and_uniqueness() -> Result<()> {
        let mut m = Manifest::new();
        assert!(m.insert("b.html")?);
        assert!(m.insert("a/c.css")?);
        assert!(!m.insert("b.html")?);
        assert_eq!(m.entries(), ["b.html", "a/c.css"]);
        assert_eq!(m.len(), 2);

        assert!(m.remove("b.html"));
        assert!(!m.remove("b.html"));
        assert_eq!(m.entries(), ["a/c.css"]);
        assert!(m.insert("b.html")?);
        Ok(())
    }

    #[test]
    fn test_rejects_unsafe_entries() {
        let mut m = Manifest::new();
        for bad in ["", "/etc/passwd", "a/../b", "./a", "a//b", "a/", "a\\b"] {
            assert!(
                matches!(
                    m.insert(bad),
                    Err(WebgenError::InvalidManifest { .. })
                ),
                "{bad:?} accepted"
            );
        }
        assert!(m.is_empty());
    }

    #[test]
    fn test_insert_path_uses_forward_slashes() -> Result<()> {
        let mut m = Manifest::new();
        assert!(m.insert_path(&Path::new("a").join("b").join("c.html"))?);
        assert!(m.contains("a/b/c.html"));
        assert!(m.insert_path(Path::new("/abs")).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("MANIFEST");
        let mut m = Manifest::new();
        _ = m.insert("z.html")?;
        _ = m.insert("a/b.png")?;
        m.save(&path)?;

        assert_eq!(fs::read_to_string(&path)?, "z.html\na/b.png\n");
        assert_eq!(Manifest::load(&path)?, m);
        Ok(())
    }

    #[test]
    fn test_load_reports_bad_line() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("MANIFEST");
        fs::write(&path, "ok.html\n\n../escape\n")?;
        match Manifest::load(&path) {
            Err(WebgenError::InvalidManifest { line, .. }) => {
                assert_eq!(line, 3)
            }
            other => panic!("unexpected: {other:?}"),
        }

        fs::write(&path, b"ok\n\xff\n")?;
        match Manifest::load(&path) {
            Err(WebgenError::InvalidManifest { line, message, .. }) => {
                assert_eq!(line, 2);
                assert!(message.contains("UTF-8"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_load_or_empty() -> Result<()> {
        let temp = TempDir::new()?;
        assert!(Manifest::load_or_empty(temp.path().join("none"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_difference_and_resolve() -> Result<()> {
        let old = Manifest::parse("a\nb/c\nd\n", Path::new("old"))?;
        let new = Manifest::parse("a\nd\ne\n", Path::new("new"))?;
        assert_eq!(old.difference(&new), vec!["b/c"]);
        assert_eq!(
            Manifest::resolve(Path::new("/srv"), "b/c"),
            Path::new("/srv").join("b").join("c")
        );
        Ok(())
    }
}
