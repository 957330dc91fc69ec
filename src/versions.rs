// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Versioned Release Manager
//!
//! Keeps generated sites as immutable, timestamped versions below a
//! versions root and tracks which one is current.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   .lock                    exclusive lock for mutating operations
//!   .last-version            newest name ever allocated
//!   .deployed-dirs           publish directories promotion created
//!   current -> 20240102030405   pointer (symlink; a pointer file off Unix)
//!   20240101120000/
//!     site/                  generated output
//!     MANIFEST               written last; marks the version complete
//!   20240102030405/
//!     ...
//! ```
//!
//! ## Guarantees
//!
//! - Version names sort chronologically and are never reused. Allocation
//!   moves past the newest name ever claimed, including collected ones
//!   recorded in `.last-version`. A name is claimed with a non-recursive
//!   `create_dir`, so two concurrent runs cannot share one.
//! - The pointer is replaced by renaming a fully written temporary entry
//!   over it. It always names a complete version or does not exist.
//! - Writing a version's `MANIFEST` and promoting it happen under one
//!   hold of the root's lock, as do [`VersionStore::change_current`] and
//!   [`VersionStore::garbage_collect`]. A collection therefore never sees
//!   a finished version before its promotion was decided. A held lock is
//!   reported as `LockContention`; nothing waits.
//! - Garbage collection renames each victim out of the listing before
//!   deleting it, so a crash leaves either the whole version or nothing
//!   visible. Leftovers are swept by the next collection.
//! - Directories without a `MANIFEST` (runs that crashed or are still in
//!   progress) are neither listed nor collected.

use std::fmt;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};

use crate::core::config::VersionsConfig;
use crate::core::error::{IoResultExt, Result, WebgenError};
use crate::deploy::{self, DeployReport};
use crate::fsutil;
use crate::generators::{timestamp_now, GenerationReport, Generator, TIMESTAMP_FORMAT};
use crate::manifest::Manifest;

/// Name of the current-version pointer.
pub const CURRENT_POINTER: &str = "current";
/// Name of the lock file.
pub const LOCK_FILE: &str = ".lock";
/// Name of a version's manifest.
pub const MANIFEST_FILE: &str = "MANIFEST";
/// Name of a version's output directory.
pub const SITE_DIR: &str = "site";
/// Name of the record of the newest allocated version name.
pub const LAST_ALLOCATED: &str = ".last-version";
/// Name of the record of publish directories promotion created.
pub const DEPLOYED_DIRS: &str = ".deployed-dirs";

#[cfg_attr(not(unix), allow(dead_code))]
const POINTER_TMP: &str = ".current.tmp";
const TRASH_PREFIX: &str = ".gc-";

/// Selects a version for [`VersionStore::change_current`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// The most recently created complete version.
    Latest,
    /// A version by name.
    Named(String),
}

impl FromStr for VersionSelector {
    type Err = WebgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(WebgenError::config_error(
                "version selector is empty; expected a version name or `latest`",
                None,
            )),
            "latest" => Ok(VersionSelector::Latest),
            name => Ok(VersionSelector::Named(name.to_string())),
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => f.write_str("latest"),
            VersionSelector::Named(name) => f.write_str(name),
        }
    }
}

/// Snapshot of the versions root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionListing {
    /// Complete versions, oldest first.
    pub versions: Vec<String>,
    /// The current version, if the pointer names a listed version.
    pub current: Option<String>,
}

impl VersionListing {
    /// Whether `name` is the current version.
    pub fn is_current(&self, name: &str) -> bool {
        self.current.as_deref() == Some(name)
    }

    /// The newest version.
    pub fn latest(&self) -> Option<&str> {
        self.versions.last().map(String::as_str)
    }
}

/// Result of [`VersionStore::generate_version`].
#[derive(Debug)]
pub struct GeneratedVersion {
    /// The new version's name.
    pub timestamp: String,
    /// The new version's directory.
    pub version_dir: PathBuf,
    /// The generation run, manifest and failures included.
    pub report: GenerationReport,
    /// Whether the version became current.
    pub promoted: bool,
    /// What promotion did to the deploy directory, when one is set.
    pub deployed: Option<DeployReport>,
}

/// Exclusive hold on a versions root. Released on drop.
#[derive(Debug)]
pub struct VersionsLock {
    file: File,
    path: PathBuf,
}

impl VersionsLock {
    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VersionsLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            log::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Manages the versions below one root directory.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
    auto_promote: bool,
    retain: usize,
    deploy_dir: Option<PathBuf>,
}

impl VersionStore {
    /// Store rooted at `root`, which is created on first write.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            auto_promote: false,
            retain: 0,
            deploy_dir: None,
        }
    }

    /// Store rooted at `root` with the `[versions]` settings applied.
    pub fn from_config<P: Into<PathBuf>>(
        root: P,
        config: &VersionsConfig,
    ) -> Self {
        Self::new(root)
            .with_auto_promote(config.auto_promote)
            .with_retain(config.retain)
            .with_deploy_dir(config.deploy_dir.clone())
    }

    /// Promote every successful version, not only the first.
    pub fn with_auto_promote(mut self, auto_promote: bool) -> Self {
        self.auto_promote = auto_promote;
        self
    }

    /// Non-current versions kept by garbage collection, newest first.
    pub fn with_retain(mut self, retain: usize) -> Self {
        self.retain = retain;
        self
    }

    /// Publish directory kept in sync with the current version.
    pub fn with_deploy_dir(mut self, deploy_dir: Option<PathBuf>) -> Self {
        self.deploy_dir = deploy_dir;
        self
    }

    /// The versions root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of version `name`.
    pub fn version_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Generated output of version `name`.
    pub fn site_dir(&self, name: &str) -> PathBuf {
        self.version_dir(name).join(SITE_DIR)
    }

    /// Manifest of version `name`.
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.version_dir(name).join(MANIFEST_FILE)
    }

    /// Takes the root's lock without waiting.
    pub fn lock(&self) -> Result<VersionsLock> {
        fs::create_dir_all(&self.root).at_path(&self.root)?;
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .at_path(&path)?;
        match file.try_lock() {
            Ok(()) => Ok(VersionsLock { file, path }),
            Err(TryLockError::WouldBlock) => {
                Err(WebgenError::LockContention { path })
            }
            Err(TryLockError::Error(e)) => Err(WebgenError::io_error(path, e)),
        }
    }

    /// Lists complete versions and the current one. Takes no lock; the
    /// pointer is read once.
    pub fn versions(&self) -> Result<VersionListing> {
        let versions = self.version_names(true)?;
        let current = self
            .read_pointer()?
            .filter(|name| versions.binary_search(name).is_ok());
        Ok(VersionListing { versions, current })
    }

    /// The current version, if any.
    pub fn current(&self) -> Result<Option<String>> {
        Ok(self.versions()?.current)
    }

    /// Generates `input_root` into a new version.
    ///
    /// The version becomes current when the run had no failures and
    /// either no version is current yet or auto-promotion is on. Runs
    /// with failures are kept as versions but never promoted.
    pub fn generate_version<P: AsRef<Path>>(
        &self,
        generator: &mut Generator,
        input_root: P,
    ) -> Result<GeneratedVersion> {
        let (timestamp, version_dir) = self.allocate()?;
        let report = match generator.generate_at(
            input_root.as_ref(),
            self.site_dir(&timestamp),
            &timestamp,
        ) {
            Ok(report) => report,
            Err(e) => {
                discard(&version_dir);
                return Err(e);
            }
        };
        log::info!("Generated version {} ({})", timestamp, report);
        self.finish_version(timestamp, version_dir, report)
    }

    /// Points current at the version `selector` resolves to, deploying it
    /// first when a deploy directory is set. Returns the version name.
    pub fn change_current(&self, selector: &VersionSelector) -> Result<String> {
        let _lock = self.lock()?;
        let listing = self.versions()?;
        let target = match selector {
            VersionSelector::Latest => listing.latest(),
            VersionSelector::Named(name) => listing
                .versions
                .iter()
                .find(|v| *v == name)
                .map(String::as_str),
        }
        .ok_or_else(|| WebgenError::NoSuchVersion {
            selector: selector.to_string(),
        })?
        .to_string();

        _ = self.promote(&target, listing.current.as_deref())?;
        Ok(target)
    }

    /// Removes every complete version except the current one and the
    /// `retain` most recent others. Removes nothing when no version is
    /// current. Returns the removed names, oldest first.
    pub fn garbage_collect(&self) -> Result<Vec<String>> {
        let _lock = self.lock()?;
        self.sweep_trash()?;

        let listing = self.versions()?;
        let Some(current) = listing.current.as_deref() else {
            log::info!("No current version; nothing collected");
            return Ok(Vec::new());
        };

        let others: Vec<&String> = listing
            .versions
            .iter()
            .filter(|v| v.as_str() != current)
            .collect();
        let victims = &others[..others.len().saturating_sub(self.retain)];

        let mut removed = Vec::with_capacity(victims.len());
        for name in victims {
            let trash = self.root.join(format!("{}{}", TRASH_PREFIX, name));
            fs::rename(self.version_dir(name), &trash).at_path(&trash)?;
            fs::remove_dir_all(&trash).at_path(&trash)?;
            log::info!("Removed version {}", name);
            removed.push((*name).clone());
        }
        Ok(removed)
    }

    /// Deploys `name` over `previous` when a deploy directory is set, then
    /// repoints current. The caller holds the lock.
    fn promote(
        &self,
        name: &str,
        previous: Option<&str>,
    ) -> Result<Option<DeployReport>> {
        let deployed = match &self.deploy_dir {
            Some(deploy_dir) => {
                let next = Manifest::load(self.manifest_path(name))?;
                let previous = previous
                    .map(|p| Manifest::load(self.manifest_path(p)))
                    .transpose()?;
                let record = self.root.join(DEPLOYED_DIRS);
                let mut created = Manifest::load_or_empty(&record)?;
                let switched = deploy::switch(
                    previous.as_ref(),
                    &self.site_dir(name),
                    deploy_dir,
                    &next,
                    &mut created,
                );
                created.save(&record)?;
                Some(switched?)
            }
            None => None,
        };
        self.write_pointer(name)?;
        log::info!("Current version is now {}", name);
        Ok(deployed)
    }

    /// Marks a generated version complete and decides its promotion, all
    /// under the lock. A version that cannot be completed is discarded.
    fn finish_version(
        &self,
        timestamp: String,
        version_dir: PathBuf,
        report: GenerationReport,
    ) -> Result<GeneratedVersion> {
        let _lock = match self.lock() {
            Ok(lock) => lock,
            Err(e) => {
                discard(&version_dir);
                return Err(e);
            }
        };
        if !version_dir.is_dir() {
            return Err(WebgenError::NoSuchVersion { selector: timestamp });
        }
        if let Err(e) = report.manifest.save(self.manifest_path(&timestamp)) {
            discard(&version_dir);
            return Err(e);
        }

        let mut generated = GeneratedVersion {
            timestamp,
            version_dir,
            report,
            promoted: false,
            deployed: None,
        };
        if !generated.report.is_success() {
            log::warn!(
                "Version {} has failures and was not made current",
                generated.timestamp
            );
            return Ok(generated);
        }

        let listing = self.versions()?;
        if !listing.versions.contains(&generated.timestamp) {
            return Err(WebgenError::NoSuchVersion {
                selector: generated.timestamp,
            });
        }
        if listing.current.is_none() || self.auto_promote {
            generated.deployed = self
                .promote(&generated.timestamp, listing.current.as_deref())?;
            generated.promoted = true;
        }
        Ok(generated)
    }

    /// Claims a fresh version directory. The name is now, or one second
    /// after the newest name ever claimed when now would not sort after it.
    fn allocate(&self) -> Result<(String, PathBuf)> {
        fs::create_dir_all(&self.root).at_path(&self.root)?;
        let mut name = timestamp_now();
        if let Some(newest) = self.newest_claimed()? {
            if newest >= name {
                name = next_second(&newest)?;
            }
        }

        let dir = self.version_dir(&name);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WebgenError::VersionCollision { version: name })
            }
            Err(e) => return Err(WebgenError::io_error(dir, e)),
        }
        let record = self.root.join(LAST_ALLOCATED);
        if let Err(e) = fsutil::write_atomic(record, format!("{}\n", name).as_bytes()) {
            discard(&dir);
            return Err(e);
        }
        Ok((name, dir))
    }

    /// Newest of the version directories, collection leftovers and the
    /// recorded last allocation.
    fn newest_claimed(&self) -> Result<Option<String>> {
        let mut newest = self.version_names(false)?.pop();
        let record = self.root.join(LAST_ALLOCATED);
        let recorded = match fs::read_to_string(&record) {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(WebgenError::io_error(record, e)),
        };
        let collected = self.trash_entries()?.into_iter().filter_map(|path| {
            path.file_name()?
                .to_str()?
                .strip_prefix(TRASH_PREFIX)
                .map(str::to_string)
        });
        for name in recorded.into_iter().chain(collected) {
            if is_version_name(&name) {
                newest = newest.max(Some(name));
            }
        }
        Ok(newest)
    }

    /// Version-named directories, sorted; only complete ones when
    /// `complete_only` is set.
    fn version_names(&self, complete_only: bool) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WebgenError::io_error(&self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.at_path(&self.root)?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_version_name(&name) || !entry.path().is_dir() {
                continue;
            }
            if complete_only && !self.manifest_path(&name).is_file() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn read_pointer(&self) -> Result<Option<String>> {
        let pointer = self.root.join(CURRENT_POINTER);
        let metadata = match fs::symlink_metadata(&pointer) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WebgenError::io_error(pointer, e)),
        };

        let name = if metadata.file_type().is_symlink() {
            let target = fs::read_link(&pointer).at_path(&pointer)?;
            target
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        } else {
            let text = fs::read_to_string(&pointer).at_path(&pointer)?;
            Some(text.trim().to_string())
        };
        Ok(name.filter(|n| is_version_name(n)))
    }

    #[cfg(unix)]
    fn write_pointer(&self, name: &str) -> Result<()> {
        let tmp = self.root.join(POINTER_TMP);
        _ = fsutil::remove_file_if_exists(&tmp)?;
        std::os::unix::fs::symlink(name, &tmp).at_path(&tmp)?;
        let pointer = self.root.join(CURRENT_POINTER);
        fs::rename(&tmp, &pointer).at_path(&pointer)
    }

    #[cfg(not(unix))]
    fn write_pointer(&self, name: &str) -> Result<()> {
        fsutil::write_atomic(
            self.root.join(CURRENT_POINTER),
            format!("{}\n", name).as_bytes(),
        )
    }

    /// Deletes versions a crashed collection left behind.
    fn sweep_trash(&self) -> Result<()> {
        for path in self.trash_entries()? {
            log::warn!("Removing leftover {}", path.display());
            fs::remove_dir_all(&path).at_path(&path)?;
        }
        Ok(())
    }

    fn trash_entries(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WebgenError::io_error(&self.root, e)),
        };
        let mut trash = Vec::new();
        for entry in entries {
            let entry = entry.at_path(&self.root)?;
            let is_trash = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(TRASH_PREFIX));
            if is_trash {
                trash.push(entry.path());
            }
        }
        Ok(trash)
    }
}

/// Removes a version directory that will never be completed.
fn discard(version_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(version_dir) {
        log::warn!(
            "Could not remove incomplete version {}: {}",
            version_dir.display(),
            e
        );
    }
}

/// Whether `name` has the shape of a version name (`YYYYMMDDHHMMSS`).
pub fn is_version_name(name: &str) -> bool {
    name.len() == 14 && name.bytes().all(|b| b.is_ascii_digit())
}

fn next_second(name: &str) -> Result<String> {
    let time = NaiveDateTime::parse_from_str(name, TIMESTAMP_FORMAT).map_err(|e| {
        WebgenError::internal_error(format!("unparsable version name `{}`: {}", name, e))
    })?;
    Ok((time + TimeDelta::seconds(1)).format(TIMESTAMP_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        generator: Generator,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("in/css")).unwrap();
            fs::write(temp.path().join("in/index.html"), "home").unwrap();
            fs::write(temp.path().join("in/css/site.css"), "body{}").unwrap();
            fs::write(temp.path().join("in/_draft.html"), "hidden").unwrap();
            Self {
                temp,
                generator: Generator::new(Pipeline::with_processors(Vec::new())),
            }
        }

        fn input(&self) -> PathBuf {
            self.temp.path().join("in")
        }

        fn store(&self) -> VersionStore {
            VersionStore::new(self.temp.path().join("versions"))
        }

        fn generate(&mut self, store: &VersionStore) -> GeneratedVersion {
            let input = self.input();
            store.generate_version(&mut self.generator, input).unwrap()
        }
    }

    #[test]
    fn test_first_version_becomes_current() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        assert_eq!(store.versions()?, VersionListing::default());

        let v = fx.generate(&store);
        assert!(v.promoted);
        assert_eq!(v.report.manifest.entries(), ["css/site.css", "index.html"]);
        assert_eq!(fs::read_to_string(store.site_dir(&v.timestamp).join("index.html"))?, "home");
        assert_eq!(
            fs::read_to_string(store.manifest_path(&v.timestamp))?,
            "css/site.css\nindex.html\n"
        );

        let listing = store.versions()?;
        assert_eq!(listing.versions, vec![v.timestamp.clone()]);
        assert_eq!(listing.current, Some(v.timestamp));
        assert!(!store.root().join(POINTER_TMP).exists());
        Ok(())
    }

    #[test]
    fn test_rapid_versions_get_distinct_increasing_names() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        let names: Vec<String> = (0..3).map(|_| fx.generate(&store).timestamp).collect();

        assert!(names.windows(2).all(|w| w[0] < w[1]), "{names:?}");
        assert!(names.iter().all(|n| is_version_name(n)));
        let listing = store.versions()?;
        assert_eq!(listing.versions, names);
        // Only the first was promoted.
        assert_eq!(listing.current.as_deref(), Some(names[0].as_str()));
        Ok(())
    }

    #[test]
    fn test_auto_promote() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store().with_auto_promote(true);
        _ = fx.generate(&store);
        let second = fx.generate(&store);
        assert!(second.promoted);
        assert_eq!(store.current()?, Some(second.timestamp));
        Ok(())
    }

    #[test]
    fn test_change_current() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        let names: Vec<String> = (0..3).map(|_| fx.generate(&store).timestamp).collect();

        assert_eq!(store.change_current(&VersionSelector::Latest)?, names[2]);
        assert_eq!(store.current()?, Some(names[2].clone()));

        let named = VersionSelector::Named(names[1].clone());
        assert_eq!(store.change_current(&named)?, names[1]);

        let missing = VersionSelector::Named("19990101000000".to_string());
        assert!(matches!(
            store.change_current(&missing),
            Err(WebgenError::NoSuchVersion { .. })
        ));
        assert_eq!(store.current()?, Some(names[1].clone()));
        Ok(())
    }

    #[test]
    fn test_change_current_without_versions() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.store().change_current(&VersionSelector::Latest),
            Err(WebgenError::NoSuchVersion { .. })
        ));
    }

    #[test]
    fn test_gc_without_current_removes_nothing() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        _ = fx.generate(&store);
        _ = fx.generate(&store);
        fs::remove_file(store.root().join(CURRENT_POINTER))?;

        assert!(store.garbage_collect()?.is_empty());
        assert_eq!(store.versions()?.versions.len(), 2);
        Ok(())
    }

    #[test]
    fn test_gc_keeps_only_current() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        let names: Vec<String> = (0..4).map(|_| fx.generate(&store).timestamp).collect();
        _ = store.change_current(&VersionSelector::Named(names[2].clone()))?;

        let removed = store.garbage_collect()?;
        assert_eq!(removed, vec![names[0].clone(), names[1].clone(), names[3].clone()]);
        let listing = store.versions()?;
        assert_eq!(listing.versions, vec![names[2].clone()]);
        assert_eq!(listing.current, Some(names[2].clone()));
        assert!(!store.version_dir(&names[0]).exists());
        Ok(())
    }

    #[test]
    fn test_gc_retains_most_recent_others() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store().with_retain(1);
        let names: Vec<String> = (0..3).map(|_| fx.generate(&store).timestamp).collect();

        // Current is the first; the newest other survives.
        assert_eq!(store.garbage_collect()?, vec![names[1].clone()]);
        assert_eq!(store.versions()?.versions, vec![names[0].clone(), names[2].clone()]);
        Ok(())
    }

    #[test]
    fn test_gc_ignores_incomplete_and_sweeps_trash() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        _ = fx.generate(&store);
        let incomplete = store.version_dir("29990101000000");
        fs::create_dir_all(incomplete.join(SITE_DIR))?;
        let trash = store.root().join(".gc-20000101000000");
        fs::create_dir_all(trash.join(SITE_DIR))?;

        assert_eq!(store.versions()?.versions.len(), 1);
        assert!(store.garbage_collect()?.is_empty());
        assert!(incomplete.exists());
        assert!(!trash.exists());
        Ok(())
    }

    #[test]
    fn test_incomplete_newest_still_bumps_allocation() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        fs::create_dir_all(store.version_dir("29990101000000"))?;
        let v = fx.generate(&store);
        assert_eq!(v.timestamp, "29990101000001");
        Ok(())
    }

    #[test]
    fn test_collected_names_are_not_reused() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        let first = fx.generate(&store);
        let second = fx.generate(&store);
        assert_eq!(store.garbage_collect()?, vec![second.timestamp.clone()]);

        let third = fx.generate(&store);
        assert!(third.timestamp > second.timestamp, "{third:?}");
        assert_eq!(
            fs::read_to_string(store.root().join(LAST_ALLOCATED))?.trim(),
            third.timestamp
        );
        assert_eq!(store.versions()?.versions, vec![first.timestamp, third.timestamp]);
        Ok(())
    }

    #[test]
    fn test_collection_leftover_bumps_allocation() -> Result<()> {
        let fx = Fixture::new();
        let store = fx.store();
        fs::create_dir_all(store.root().join(".gc-29990101000000"))?;
        let (name, dir) = store.allocate()?;
        assert_eq!(name, "29990101000001");
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn test_collection_during_generation_spares_new_version() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store().with_auto_promote(true);
        let first = fx.generate(&store);

        let input = fx.input();
        let (name, dir) = store.allocate()?;
        let report = fx.generator.generate_at(&input, store.site_dir(&name), &name)?;
        // The unfinished version is invisible to a collection.
        assert!(store.garbage_collect()?.is_empty());
        assert!(dir.is_dir());

        let finished = store.finish_version(name.clone(), dir, report)?;
        assert!(finished.promoted);
        assert_eq!(store.current()?, Some(name.clone()));
        assert!(store.site_dir(&name).join("index.html").is_file());
        assert_eq!(store.garbage_collect()?, vec![first.timestamp]);
        Ok(())
    }

    #[test]
    fn test_vanished_version_is_not_promoted() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store().with_auto_promote(true);
        let first = fx.generate(&store);

        let input = fx.input();
        let (name, dir) = store.allocate()?;
        let report = fx.generator.generate_at(&input, store.site_dir(&name), &name)?;
        fs::remove_dir_all(&dir)?;

        assert!(matches!(
            store.finish_version(name, dir.clone(), report),
            Err(WebgenError::NoSuchVersion { .. })
        ));
        assert!(!dir.exists());
        assert_eq!(store.current()?, Some(first.timestamp));
        Ok(())
    }

    #[test]
    fn test_lock_contention_discards_unfinished_version() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        let lock = store.lock()?;
        let input = fx.input();
        assert!(matches!(
            store.generate_version(&mut fx.generator, input),
            Err(WebgenError::LockContention { .. })
        ));
        drop(lock);
        assert!(store.version_names(false)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_run_is_kept_but_not_promoted() -> Result<()> {
        #[derive(Debug)]
        struct Reject;
        impl crate::core::traits::Processor for Reject {
            fn name(&self) -> &'static str {
                "Reject"
            }
            fn can_handle(&self, path: &Path) -> bool {
                path.extension().is_some_and(|e| e == "css")
            }
            fn process(
                &self,
                input: &Path,
                _output: &Path,
            ) -> Result<crate::core::traits::Outcome> {
                Err(WebgenError::render_error(input.to_path_buf(), "nope"))
            }
        }

        let mut fx = Fixture::new();
        let renderer: Box<dyn crate::core::traits::Processor> = Box::new(Reject);
        fx.generator = Generator::new(Pipeline::with_processors(vec![renderer]));
        let store = fx.store();
        let v = fx.generate(&store);

        assert!(!v.promoted);
        assert_eq!(v.report.failures.len(), 1);
        let listing = store.versions()?;
        assert_eq!(listing.versions, vec![v.timestamp]);
        assert_eq!(listing.current, None);
        Ok(())
    }

    #[test]
    fn test_fatal_error_removes_claimed_directory() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        let missing = fx.temp.path().join("no-such-input");
        assert!(store.generate_version(&mut fx.generator, missing).is_err());
        assert!(store.version_names(false)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_lock_contention_is_reported() -> Result<()> {
        let mut fx = Fixture::new();
        let store = fx.store();
        _ = fx.generate(&store);

        let lock = store.lock()?;
        assert!(lock.path().ends_with(LOCK_FILE));
        assert!(matches!(
            store.change_current(&VersionSelector::Latest),
            Err(WebgenError::LockContention { .. })
        ));
        assert!(matches!(
            store.garbage_collect(),
            Err(WebgenError::LockContention { .. })
        ));
        // Listing needs no lock.
        assert_eq!(store.versions()?.versions.len(), 1);
        drop(lock);

        assert!(store.garbage_collect().is_ok());
        Ok(())
    }

    #[test]
    fn test_promotion_syncs_deploy_dir() -> Result<()> {
        let mut fx = Fixture::new();
        let publish = fx.temp.path().join("publish");
        fs::create_dir_all(&publish)?;
        fs::write(publish.join("foreign.txt"), "theirs")?;
        let store = fx
            .store()
            .with_auto_promote(true)
            .with_deploy_dir(Some(publish.clone()));

        let first = fx.generate(&store);
        assert_eq!(first.deployed.map(|d| d.written), Some(2));
        assert!(publish.join("css/site.css").exists());

        fs::remove_file(fx.input().join("css/site.css"))?;
        fs::write(fx.input().join("about.html"), "about")?;
        let second = fx.generate(&store);
        assert_eq!(second.deployed.map(|d| d.removed), Some(1));
        assert!(publish.join("about.html").exists());
        assert!(!publish.join("css").exists());
        assert!(publish.join("foreign.txt").exists());

        // Rolling back restores the first version's files.
        _ = store.change_current(&VersionSelector::Named(first.timestamp))?;
        assert!(publish.join("css/site.css").exists());
        assert!(!publish.join("about.html").exists());
        Ok(())
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("latest".parse::<VersionSelector>().unwrap(), VersionSelector::Latest);
        assert_eq!(
            "20240101000000".parse::<VersionSelector>().unwrap(),
            VersionSelector::Named("20240101000000".to_string())
        );
        assert!(matches!(
            "".parse::<VersionSelector>(),
            Err(WebgenError::ConfigError { .. })
        ));
        assert_eq!(VersionSelector::Latest.to_string(), "latest");
    }

    #[test]
    fn test_next_second_rolls_over() -> Result<()> {
        assert_eq!(next_second("20231231235959")?, "20240101000000");
        assert!(next_second("notatimestamp").is_err());
        Ok(())
    }
}
