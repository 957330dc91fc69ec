//! # Core Traits Module
//!
//! This module defines the two seams of the processing pipeline.
//!
//! ## Key Traits
//!
//! - [`Processor`]: claims one category of input file and turns it into
//!   at most one output file. The pipeline drives its run lifecycle.
//! - [`Renderer`]: the contract a rendering engine satisfies to become
//!   pluggable. A renderer is wrapped by
//!   [`RenderProcessor`](crate::processors::RenderProcessor), which owns
//!   the run-scoped engine state and the file IO.
//!
//! ## Lifecycle
//!
//! ```text
//! start_run(ctx) -> { rename(path); process(in, out) }* -> end_run()
//! ```
//!
//! `end_run` is always called once `start_run` has been attempted, even
//! when a file fails or the run is aborted.

use std::path::{Path, PathBuf};

use crate::core::context::Context;
use crate::core::error::Result;

/// What a processor did with a file it claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An output file was written and belongs in the manifest.
    Emitted,
    /// The file was handled without producing output.
    Skipped,
}

/// A single-responsibility file handler in the pipeline.
pub trait Processor: std::fmt::Debug {
    /// Registry name of the processor.
    fn name(&self) -> &'static str;

    /// Whether this processor claims the file at `path` (relative to the
    /// input root).
    fn can_handle(&self, path: &Path) -> bool;

    /// Establishes run-scoped state. Called once, in pipeline order,
    /// before any file is processed.
    fn start_run(&mut self, _context: &Context) -> Result<()> {
        Ok(())
    }

    /// Turns `input` into `output`. Both are absolute paths. Writers
    /// create the parent directory of `output` themselves.
    fn process(&self, input: &Path, output: &Path) -> Result<Outcome>;

    /// Maps an input-relative path to its output-relative path.
    fn rename(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    /// Releases run-scoped state. Must tolerate a run that never started.
    fn end_run(&mut self) {}
}

/// Contract for a pluggable rendering engine.
///
/// Engine state lives in [`Renderer::State`], created from the run's
/// [`Context`] and dropped when the run ends, so no engine state survives
/// between runs.
pub trait Renderer: std::fmt::Debug {
    /// Per-run engine state.
    type State;

    /// Registry name of the renderer.
    fn name(&self) -> &'static str;

    /// Capability predicate on the input-relative path.
    fn matches(&self, path: &Path) -> bool;

    /// Builds the engine for one run.
    fn prepare(&self, context: &Context) -> Result<Self::State>;

    /// Renders raw file content. Failures should be
    /// [`RenderError`](crate::core::error::WebgenError::RenderError)s
    /// naming `path` and, where the engine reports one, the location.
    fn render(
        &self,
        state: &Self::State,
        raw: &str,
        path: &Path,
    ) -> Result<String>;

    /// Output-name rewriting; identity by default.
    fn rename(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Returns true when the final component of `path` has extension `ext`.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}
