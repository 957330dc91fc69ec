// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Deployment Module
//!
//! Materialises the files a [`Manifest`] lists into a publish directory,
//! and removes exactly those files again.
//!
//! The deployer never looks at the publish directory beyond the manifest's
//! own paths, so it can share that directory with content managed by
//! something else.
//!
//! - [`deploy`] copies every listed file from the output directory,
//!   overwriting what is there. Running it twice changes nothing.
//! - [`undeploy`] removes every listed file that still exists. Missing
//!   files are counted, not errors.
//! - [`switch`] moves a publish directory from one manifest to another:
//!   the new files are deployed first, then only the paths the new
//!   manifest no longer lists are removed.
//!
//! Each operation takes a record of the directories deploys created,
//! kept as a [`Manifest`] of directory paths. Deploying adds the ones it
//! makes; removing files prunes recorded directories that became empty.
//! Directories that existed before, empty or not, are never removed. The
//! file-based wrappers keep the record next to the manifest, see
//! [`dirs_record_path`].

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::error::{IoResultExt, Result, WebgenError};
use crate::fsutil;
use crate::manifest::Manifest;

/// What a deploy operation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// Files copied into the publish directory.
    pub written: usize,
    /// Files removed from the publish directory.
    pub removed: usize,
    /// Listed files that were already absent when removing.
    pub missing: usize,
}

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} removed, {} already absent",
            self.written, self.removed, self.missing
        )
    }
}

/// Suffix of the created-directories record kept next to a manifest file.
pub const DIRS_RECORD_SUFFIX: &str = ".dirs";

/// Where the file-based wrappers keep the directories deploying
/// `manifest_path` created.
pub fn dirs_record_path(manifest_path: &Path) -> PathBuf {
    let mut name = OsString::from(manifest_path.as_os_str());
    name.push(DIRS_RECORD_SUFFIX);
    PathBuf::from(name)
}

/// Copies every file in `manifest` from `output_dir` into `deploy_dir`.
/// Directories it has to create are added to `created`.
pub fn deploy(
    output_dir: &Path,
    deploy_dir: &Path,
    manifest: &Manifest,
    created: &mut Manifest,
) -> Result<DeployReport> {
    fs::create_dir_all(deploy_dir).at_path(deploy_dir)?;

    let mut report = DeployReport::default();
    for entry in manifest.iter() {
        let source = Manifest::resolve(output_dir, entry);
        let target = Manifest::resolve(deploy_dir, entry);
        log::debug!("Deploying {}", entry);
        create_parents(deploy_dir, entry, created)?;
        _ = fsutil::copy_atomic(&source, &target)?;
        report.written += 1;
    }

    log::info!(
        "Deployed {} files from {} to {}",
        report.written,
        output_dir.display(),
        deploy_dir.display()
    );
    Ok(report)
}

/// Removes every file in `manifest` from `deploy_dir`, then the
/// directories in `created` that became empty. Nothing is read from
/// `output_dir`.
pub fn undeploy(
    output_dir: &Path,
    deploy_dir: &Path,
    manifest: &Manifest,
    created: &mut Manifest,
) -> Result<DeployReport> {
    log::debug!(
        "Undeploying files of {} from {}",
        output_dir.display(),
        deploy_dir.display()
    );
    let report = remove_entries(deploy_dir, manifest.iter(), created)?;
    log::info!(
        "Undeployed {} files from {} ({} already absent)",
        report.removed,
        deploy_dir.display(),
        report.missing
    );
    Ok(report)
}

/// Moves `deploy_dir` from the `previous` manifest to `next`. Files only
/// `previous` lists are removed after `next` is fully deployed.
pub fn switch(
    previous: Option<&Manifest>,
    output_dir: &Path,
    deploy_dir: &Path,
    next: &Manifest,
    created: &mut Manifest,
) -> Result<DeployReport> {
    let mut report = deploy(output_dir, deploy_dir, next, created)?;
    if let Some(previous) = previous {
        let stale = previous.difference(next);
        let removed = remove_entries(deploy_dir, stale, created)?;
        report.removed = removed.removed;
        report.missing = removed.missing;
    }
    log::info!("Switched {}: {}", deploy_dir.display(), report);
    Ok(report)
}

/// [`deploy`] with the manifest read from `manifest_path` and the
/// created-directories record kept at [`dirs_record_path`].
pub fn deploy_manifest(
    output_dir: &Path,
    deploy_dir: &Path,
    manifest_path: &Path,
) -> Result<DeployReport> {
    let manifest = Manifest::load(manifest_path)?;
    let record = dirs_record_path(manifest_path);
    let mut created = Manifest::load_or_empty(&record)?;
    let report = deploy(output_dir, deploy_dir, &manifest, &mut created);
    created.save(&record)?;
    report
}

/// [`undeploy`] with the manifest read from `manifest_path`. Without a
/// record no directory is removed.
pub fn undeploy_manifest(
    output_dir: &Path,
    deploy_dir: &Path,
    manifest_path: &Path,
) -> Result<DeployReport> {
    let manifest = Manifest::load(manifest_path)?;
    let record = dirs_record_path(manifest_path);
    let mut created = Manifest::load_or_empty(&record)?;
    let report = undeploy(output_dir, deploy_dir, &manifest, &mut created);
    if created.is_empty() {
        _ = fsutil::remove_file_if_exists(&record)?;
    } else {
        created.save(&record)?;
    }
    report
}

/// Creates the missing directories above `entry`, outermost first,
/// recording each one.
fn create_parents(
    deploy_dir: &Path,
    entry: &str,
    created: &mut Manifest,
) -> Result<()> {
    let Some((parent, _)) = entry.rsplit_once('/') else {
        return Ok(());
    };
    let mut relative = String::with_capacity(parent.len());
    for part in parent.split('/') {
        if !relative.is_empty() {
            relative.push('/');
        }
        relative.push_str(part);
        let dir = Manifest::resolve(deploy_dir, &relative);
        match fs::create_dir(&dir) {
            Ok(()) => {
                log::debug!("Created directory {}", relative);
                _ = created.insert(relative.as_str())?;
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(WebgenError::io_error(dir, e)),
        }
    }
    Ok(())
}

fn remove_entries<I, S>(
    deploy_dir: &Path,
    entries: I,
    created: &mut Manifest,
) -> Result<DeployReport>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = DeployReport::default();
    for entry in entries {
        let entry = entry.as_ref();
        let target = Manifest::resolve(deploy_dir, entry);
        if fsutil::remove_file_if_exists(&target)? {
            log::debug!("Removed {}", entry);
            report.removed += 1;
        } else {
            report.missing += 1;
        }
    }
    prune_created(deploy_dir, created);
    Ok(report)
}

/// Removes the recorded directories that are empty, innermost first, and
/// forgets the ones that are gone.
fn prune_created(deploy_dir: &Path, created: &mut Manifest) {
    let mut dirs = created.entries().to_vec();
    dirs.sort_unstable_by(|a, b| b.cmp(a));
    for relative in dirs {
        let dir = Manifest::resolve(deploy_dir, &relative);
        match fs::remove_dir(&dir) {
            Ok(()) => log::debug!("Removed empty directory {}", relative),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(_) => continue,
        }
        _ = created.remove(&relative);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// Relative path → content for every entry (directories as `None`).
    fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = e
                    .file_type()
                    .is_file()
                    .then(|| fs::read(e.path()).unwrap());
                (rel, content)
            })
            .collect()
    }

    fn fixture() -> (TempDir, std::path::PathBuf, std::path::PathBuf, Manifest) {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let publish = temp.path().join("publish");
        fs::create_dir_all(out.join("css")).unwrap();
        fs::write(out.join("index.html"), "<p>new</p>").unwrap();
        fs::write(out.join("css/site.css"), "body{}").unwrap();
        fs::write(out.join("unlisted.txt"), "x").unwrap();

        fs::create_dir_all(publish.join("external")).unwrap();
        fs::write(publish.join("external/keep.txt"), "theirs").unwrap();
        fs::write(publish.join("robots.txt"), "theirs").unwrap();

        let manifest =
            Manifest::parse("index.html\ncss/site.css\n", Path::new("m"))
                .unwrap();
        (temp, out, publish, manifest)
    }

    #[test]
    fn test_deploy_then_undeploy_restores_directory() -> Result<()> {
        let (_temp, out, publish, manifest) = fixture();
        let before = snapshot(&publish);
        let mut created = Manifest::new();

        let report = deploy(&out, &publish, &manifest, &mut created)?;
        assert_eq!(report.written, 2);
        assert_eq!(created.entries(), ["css"]);
        assert_eq!(fs::read_to_string(publish.join("index.html"))?, "<p>new</p>");
        assert!(!publish.join("unlisted.txt").exists());

        let report = undeploy(&out, &publish, &manifest, &mut created)?;
        assert_eq!(report.removed, 2);
        assert!(created.is_empty());
        assert_eq!(snapshot(&publish), before);
        Ok(())
    }

    #[test]
    fn test_undeploy_keeps_preexisting_empty_directories() -> Result<()> {
        let (_temp, out, publish, _) = fixture();
        fs::create_dir_all(publish.join("css"))?;
        fs::create_dir_all(publish.join("empty"))?;
        let manifest =
            Manifest::parse("css/site.css
css/img/logo.txt
", Path::new("m"))?;
        fs::create_dir_all(out.join("css/img"))?;
        fs::write(out.join("css/img/logo.txt"), "logo")?;
        let before = snapshot(&publish);
        let mut created = Manifest::new();

        _ = deploy(&out, &publish, &manifest, &mut created)?;
        assert_eq!(created.entries(), ["css/img"]);

        _ = undeploy(&out, &publish, &manifest, &mut created)?;
        assert!(publish.join("css").is_dir());
        assert!(!publish.join("css/img").exists());
        assert_eq!(snapshot(&publish), before);
        Ok(())
    }

    #[test]
    fn test_deploy_is_idempotent_and_overwrites() -> Result<()> {
        let (_temp, out, publish, manifest) = fixture();
        fs::write(publish.join("index.html"), "stale")?;
        let mut created = Manifest::new();

        _ = deploy(&out, &publish, &manifest, &mut created)?;
        let once = snapshot(&publish);
        _ = deploy(&out, &publish, &manifest, &mut created)?;
        assert_eq!(snapshot(&publish), once);
        assert_eq!(created.entries(), ["css"]);
        assert_eq!(fs::read_to_string(publish.join("index.html"))?, "<p>new</p>");
        Ok(())
    }

    #[test]
    fn test_undeploy_of_absent_files_succeeds() -> Result<()> {
        let (_temp, out, publish, manifest) = fixture();
        let before = snapshot(&publish);

        let report = undeploy(&out, &publish, &manifest, &mut Manifest::new())?;
        assert_eq!(report, DeployReport { written: 0, removed: 0, missing: 2 });
        assert_eq!(snapshot(&publish), before);
        Ok(())
    }

    #[test]
    fn test_undeploy_keeps_directories_with_foreign_files() -> Result<()> {
        let (_temp, out, publish, manifest) = fixture();
        let mut created = Manifest::new();
        _ = deploy(&out, &publish, &manifest, &mut created)?;
        fs::write(publish.join("css/theirs.css"), "x")?;

        _ = undeploy(&out, &publish, &manifest, &mut created)?;
        assert!(publish.join("css/theirs.css").exists());
        assert!(!publish.join("css/site.css").exists());
        assert!(publish.join("robots.txt").exists());
        // Still ours once the foreign file is gone.
        assert_eq!(created.entries(), ["css"]);
        Ok(())
    }

    #[test]
    fn test_deploy_missing_source_fails() {
        let (_temp, out, publish, _) = fixture();
        let manifest = Manifest::parse("nope.html\n", Path::new("m")).unwrap();
        assert!(deploy(&out, &publish, &manifest, &mut Manifest::new()).is_err());
        assert!(!publish.join("nope.html").exists());
    }

    #[test]
    fn test_switch_removes_only_stale_paths() -> Result<()> {
        let (_temp, out, publish, old) = fixture();
        let mut created = Manifest::new();
        _ = deploy(&out, &publish, &old, &mut created)?;

        let next = Manifest::parse("index.html\nunlisted.txt\n", Path::new("m"))?;
        let report = switch(Some(&old), &out, &publish, &next, &mut created)?;
        assert_eq!(report.written, 2);
        assert_eq!(report.removed, 1);
        assert!(publish.join("index.html").exists());
        assert!(publish.join("unlisted.txt").exists());
        assert!(!publish.join("css").exists());
        assert!(created.is_empty());
        assert!(publish.join("external/keep.txt").exists());
        Ok(())
    }

    #[test]
    fn test_manifest_file_wrappers() -> Result<()> {
        let (temp, out, publish, manifest) = fixture();
        let path = temp.path().join("MANIFEST");
        manifest.save(&path)?;
        let record = dirs_record_path(&path);
        assert_eq!(record, temp.path().join("MANIFEST.dirs"));

        assert_eq!(deploy_manifest(&out, &publish, &path)?.written, 2);
        assert_eq!(fs::read_to_string(&record)?, "css\n");
        assert_eq!(undeploy_manifest(&out, &publish, &path)?.removed, 2);
        assert!(!publish.join("css").exists());
        assert!(!record.exists());
        assert!(deploy_manifest(&out, &publish, &temp.path().join("none")).is_err());
        Ok(())
    }
}
