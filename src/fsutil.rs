// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filesystem primitives with the atomicity the pipeline relies on.
//!
//! Every output file is written to a temporary file in its destination
//! directory and then renamed over the final name, so a killed process
//! never leaves a half-written file visible under that name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::core::error::{IoResultExt, Result, WebgenError};

/// Reads a UTF-8 text file. Invalid UTF-8 is reported as a render error
/// for that file rather than an IO failure.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    fs::read_to_string(path_ref).map_err(|e| {
        if e.kind() == io::ErrorKind::InvalidData {
            WebgenError::render_error(
                path_ref.to_path_buf(),
                "input is not valid UTF-8",
            )
        } else {
            WebgenError::io_error(path_ref, e)
        }
    })
}

/// Atomically writes `content` to `path`, creating parent directories.
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path_ref = path.as_ref();
    let parent = ensure_parent(path_ref)?;

    let mut tmp = NamedTempFile::new_in(&parent).at_path(&parent)?;
    tmp.write_all(content).at_path(tmp.path().to_path_buf())?;
    tmp.as_file().sync_all().at_path(tmp.path().to_path_buf())?;
    set_public_permissions(tmp.as_file()).at_path(path_ref)?;
    persist(tmp, path_ref)
}

/// Atomically copies `src` over `dst`, creating parent directories. The
/// copy keeps the source file's permissions.
pub fn copy_atomic<P: AsRef<Path>, Q: AsRef<Path>>(
    src: P,
    dst: Q,
) -> Result<u64> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    let parent = ensure_parent(dst)?;

    let tmp = NamedTempFile::new_in(&parent).at_path(&parent)?;
    let bytes = fs::copy(src, tmp.path()).at_path(src)?;
    persist(tmp, dst)?;
    Ok(bytes)
}

/// Removes a file, treating an already-missing file as success. Returns
/// whether a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WebgenError::io_error(path, e)),
    }
}

fn ensure_parent(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).at_path(&parent)?;
    Ok(parent)
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    _ = tmp
        .persist(path)
        .map_err(|e| WebgenError::io_error(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_public_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_public_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
