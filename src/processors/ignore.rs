//! Filters files that must never reach the output tree.

use std::path::Path;

use crate::core::error::Result;
use crate::core::traits::{Outcome, Processor};

/// Claims hidden/protected (`_name`), editor lock (`.#name`) and backup
/// (`name~`) files and emits nothing for them.
///
/// `_`-prefixed files are typically layouts and partials: renderers can
/// still read them from the input tree, they are just never published.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreProcessor;

impl IgnoreProcessor {
    /// Registry name.
    pub const NAME: &'static str = "Ignore";

    /// Whether `path`'s file name marks it as protected.
    pub fn is_protected(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| {
                name.starts_with('_')
                    || name.starts_with(".#")
                    || name.ends_with('~')
            })
            .unwrap_or(false)
    }
}

impl Processor for IgnoreProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        Self::is_protected(path)
    }

    fn process(&self, input: &Path, _output: &Path) -> Result<Outcome> {
        log::debug!("Ignoring protected file {}", input.display());
        Ok(Outcome::Skipped)
    }
}
