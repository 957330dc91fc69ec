// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Error Handling for Webgen
//!
//! This module defines the error taxonomy shared by the processor
//! pipeline, the generator, the version store and the deployer. The
//! `thiserror` crate is used to keep the variants declarative.
//!
//! Errors fall into a few families:
//!
//! - **Configuration** (`ConfigError`, `UnknownProcessor`,
//!   `MissingDependency`): fatal, raised before any output is written.
//! - **Per-file** (`RenderError`, `OutputConflict`): collected by the
//!   generator and summarised after the run.
//! - **Version store** (`VersionCollision`, `NoSuchVersion`,
//!   `LockContention`): fatal to a single operation, never corrupting
//!   the versions root.
//! - **IO**: fatal, with the offending path attached where known.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A unified result type for the Webgen library.
pub type Result<T> = std::result::Result<T, WebgenError>;

/// The main error type for Webgen.
#[derive(Error, Debug)]
pub enum WebgenError {
    /// Error related to configuration loading or validation.
    #[error("Configuration error: {message}.")]
    ConfigError {
        /// Detailed description of the configuration error.
        message: String,
        /// Optional path of the configuration file that caused the error.
        path: Option<PathBuf>,
    },

    /// A processor name that is not part of the registry.
    #[error("Unknown processor `{name}` (known processors: {known}).")]
    UnknownProcessor {
        /// The name that failed to resolve.
        name: String,
        /// Comma separated list of registered names.
        known: String,
    },

    /// One or more requested processors need an engine that was not
    /// compiled into this build.
    #[error(
        "Missing dependencies {} required by processors {}.",
        .dependencies.join(", "),
        .processors.join(", ")
    )]
    MissingDependency {
        /// Processors that cannot be instantiated.
        processors: Vec<String>,
        /// Every unmet dependency, deduplicated.
        dependencies: Vec<String>,
    },

    /// A renderer rejected a specific input file.
    #[error("Render error in `{}`{}: {message}", .path.display(), location(.line, .column))]
    RenderError {
        /// The input file being rendered.
        path: PathBuf,
        /// Description reported by the engine.
        message: String,
        /// Line number, when the engine reports one.
        line: Option<usize>,
        /// Column number, when the engine reports one.
        column: Option<usize>,
    },

    /// Two inputs were mapped to the same output path.
    #[error(
        "Output `{output}` from `{}` was already produced by `{}`.",
        .second.display(),
        .first.display()
    )]
    OutputConflict {
        /// Output-relative path both inputs resolve to.
        output: String,
        /// The input that produced the output first.
        first: PathBuf,
        /// The input that was rejected.
        second: PathBuf,
    },

    /// A version directory with the allocated name already exists.
    #[error("Version `{version}` already exists.")]
    VersionCollision {
        /// The colliding version name.
        version: String,
    },

    /// The selector did not resolve to a complete version.
    #[error("No such version: `{selector}`.")]
    NoSuchVersion {
        /// The selector as given by the caller.
        selector: String,
    },

    /// The versions root is locked by another operation.
    #[error("Versions root is locked by another process (`{}`); retry later.", .path.display())]
    LockContention {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// A manifest file contains an unusable entry.
    #[error("Invalid manifest `{}` line {line}: {message}.", .path.display())]
    InvalidManifest {
        /// The manifest file.
        path: PathBuf,
        /// 1-based line number of the offending entry.
        line: usize,
        /// Why the entry was rejected.
        message: String,
    },

    /// A generation run finished with per-file failures.
    #[error("{} file(s) failed to generate:\n{}", .failures.len(), failure_list(.failures))]
    GenerationFailed {
        /// The failed inputs and their errors, in input order.
        failures: Vec<FileFailure>,
    },

    /// IO error encountered during file operations.
    #[error("File IO error at `{path:?}`: {source}")]
    IOError {
        /// Path associated with the IO error.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// General internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// An input file that could not be turned into an output.
#[derive(Debug)]
pub struct FileFailure {
    /// Input path relative to the input root.
    pub input: PathBuf,
    /// Why processing failed.
    pub error: WebgenError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.input.display(), self.error)
    }
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => {
            format!(" at line {line}, column {column}")
        }
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

fn failure_list(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  {failure}\n"))
        .collect()
}

impl From<std::io::Error> for WebgenError {
    /// Converts a standard IO error into a `WebgenError::IOError` with an
    /// empty path. Prefer [`WebgenError::io_error`] when the path is known.
    fn from(source: std::io::Error) -> Self {
        WebgenError::IOError {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<walkdir::Error> for WebgenError {
    fn from(error: walkdir::Error) -> Self {
        let path = error.path().map(PathBuf::from).unwrap_or_default();
        match error.into_io_error() {
            Some(source) => WebgenError::IOError { path, source },
            None => WebgenError::internal_error(format!(
                "filesystem loop detected at {}",
                path.display()
            )),
        }
    }
}

impl WebgenError {
    /// Creates a `ConfigError` with a specific message.
    pub fn config_error<S: Into<String>>(
        message: S,
        path: Option<PathBuf>,
    ) -> Self {
        WebgenError::ConfigError {
            message: message.into(),
            path,
        }
    }

    /// Creates a `RenderError` without location information.
    pub fn render_error<S: Into<String>>(
        path: PathBuf,
        message: S,
    ) -> Self {
        WebgenError::RenderError {
            path,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Creates a `RenderError` carrying the engine's reported location.
    pub fn render_error_at<S: Into<String>>(
        path: PathBuf,
        message: S,
        line: Option<usize>,
        column: Option<usize>,
    ) -> Self {
        WebgenError::RenderError {
            path,
            message: message.into(),
            line,
            column,
        }
    }

    /// Wraps an IO error as an `IOError` variant with the specified path.
    pub fn io_error<P: Into<PathBuf>>(
        path: P,
        source: std::io::Error,
    ) -> Self {
        WebgenError::IOError {
            path: path.into(),
            source,
        }
    }

    /// Creates a general internal error with a custom message.
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        WebgenError::InternalError(message.into())
    }

    /// Whether this error belongs to the configuration family, which is
    /// always raised before any output is written.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WebgenError::ConfigError { .. }
                | WebgenError::UnknownProcessor { .. }
                | WebgenError::MissingDependency { .. }
        )
    }

    /// Whether the failure is confined to a single input file.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            WebgenError::RenderError { .. }
                | WebgenError::OutputConflict { .. }
        )
    }

    /// Process exit code for this error: [`EXIT_TEMPFAIL`] when the
    /// operation can simply be retried, `1` otherwise. Usage errors (`2`)
    /// are produced by the argument parser.
    pub fn exit_code(&self) -> i32 {
        match self {
            WebgenError::LockContention { .. } => EXIT_TEMPFAIL,
            _ => 1,
        }
    }
}

/// Exit code for a temporary failure worth retrying (`EX_TEMPFAIL`).
pub const EXIT_TEMPFAIL: i32 = 75;

/// Helper for attaching a path to IO results.
pub trait IoResultExt<T> {
    /// Maps the IO error into `WebgenError::IOError` at `path`.
    fn at_path<P: Into<PathBuf>>(self, path: P) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path<P: Into<PathBuf>>(self, path: P) -> Result<T> {
        self.map_err(|e| WebgenError::io_error(path, e))
    }
}
