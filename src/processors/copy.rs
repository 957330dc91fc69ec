//! The catch-all processor at the end of every pipeline.

use std::path::Path;

use crate::core::error::Result;
use crate::core::traits::{Outcome, Processor};
use crate::fsutil;

/// Copies any file byte for byte. `can_handle` is always true, which
/// makes every pipeline total.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyProcessor;

impl CopyProcessor {
    /// Registry name.
    pub const NAME: &'static str = "Copy";
}

impl Processor for CopyProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, _path: &Path) -> bool {
        true
    }

    fn process(&self, input: &Path, output: &Path) -> Result<Outcome> {
        _ = fsutil::copy_atomic(input, output)?;
        Ok(Outcome::Emitted)
    }
}
