// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Processor Pipeline
//!
//! An ordered chain of processors in which the first processor whose
//! `can_handle` matches claims a file.
//!
//! The shape is fixed: the ignore filter comes first, configured renderers
//! follow in the requested order and the copy processor closes the chain.
//! Because copy matches everything, [`Pipeline::resolve`] is total.
//!
//! A run is scoped by [`PipelineRun`]: [`Pipeline::start_run`] starts every
//! processor and the returned guard ends them all when it is dropped, on
//! every exit path.
//!
//! ```rust
//! use webgen::pipeline::Pipeline;
//! use webgen::processors::ProcessorOptions;
//!
//! let pipeline = Pipeline::from_names(&["CssYaml"], ProcessorOptions::default())?;
//! assert_eq!(pipeline.names(), vec!["Ignore", "CssYaml", "Copy"]);
//! assert!(Pipeline::from_names(&["Nope"], ProcessorOptions::default()).is_err());
//! # Ok::<(), webgen::WebgenError>(())
//! ```

use std::path::Path;
use std::str::FromStr;

use crate::core::config::SiteConfig;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::traits::Processor;
use crate::processors::{
    check_dependencies, CopyProcessor, Dependency, IgnoreProcessor,
    ProcessorKind, ProcessorOptions,
};

/// Ordered, total chain of processors.
#[derive(Debug)]
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
    fallback: CopyProcessor,
}

impl Pipeline {
    /// Builds `[Ignore] + kinds + [Copy]`. Every requested renderer's
    /// dependencies are checked first, and all unmet ones are reported in
    /// one `MissingDependency` error.
    pub fn build(
        kinds: &[ProcessorKind],
        options: ProcessorOptions,
    ) -> Result<Self> {
        check_dependencies(kinds, Dependency::is_compiled)?;
        let renderers = kinds
            .iter()
            .map(|kind| kind.instantiate(options))
            .collect::<Result<Vec<_>>>()?;
        let pipeline = Self::with_processors(renderers);
        log::info!("Pipeline: {}", pipeline.names().join(" -> "));
        Ok(pipeline)
    }

    /// Like [`Pipeline::build`], resolving names first. The first unknown
    /// name fails with `UnknownProcessor`.
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        options: ProcessorOptions,
    ) -> Result<Self> {
        let kinds = names
            .iter()
            .map(|name| ProcessorKind::from_str(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::build(&kinds, options)
    }

    /// Builds the pipeline a site configuration asks for.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        Self::build(
            &config.processor_kinds()?,
            ProcessorOptions {
                minify_html: config.minify_html,
            },
        )
    }

    /// Wraps arbitrary processors between the ignore filter and the copy
    /// processor. No dependency checks are made.
    pub fn with_processors(middle: Vec<Box<dyn Processor>>) -> Self {
        let mut processors: Vec<Box<dyn Processor>> =
            Vec::with_capacity(middle.len() + 1);
        processors.push(Box::new(IgnoreProcessor));
        processors.extend(middle);
        Self {
            processors,
            fallback: CopyProcessor,
        }
    }

    /// Processor names in pipeline order.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|p| p.name()).collect()
    }

    /// Number of processors, ignore and copy included.
    pub fn len(&self) -> usize {
        self.processors.len() + 1
    }

    /// Always false; a pipeline holds at least ignore and copy.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The processor claiming `path` (relative to the input root).
    pub fn resolve(&self, path: &Path) -> &dyn Processor {
        self.processors
            .iter()
            .map(|p| p.as_ref())
            .find(|p| p.can_handle(path))
            .unwrap_or(&self.fallback)
    }

    /// Starts a run. Processors are started in order; if one fails, every
    /// processor is ended again before the error is returned.
    pub fn start_run(&mut self, context: &Context) -> Result<PipelineRun<'_>> {
        let mut run = PipelineRun { pipeline: self };
        for processor in run.pipeline.processors.iter_mut() {
            log::debug!("Starting {}", processor.name());
            processor.start_run(context)?;
        }
        run.pipeline.fallback.start_run(context)?;
        Ok(run)
    }

    fn iter(&self) -> impl Iterator<Item = &dyn Processor> {
        let fallback: &dyn Processor = &self.fallback;
        self.processors
            .iter()
            .map(|p| p.as_ref())
            .chain(std::iter::once(fallback))
    }

    fn end_run(&mut self) {
        for processor in self.processors.iter_mut() {
            processor.end_run();
        }
        self.fallback.end_run();
    }
}

/// Guard for one pipeline run. Dropping it ends the run.
#[derive(Debug)]
pub struct PipelineRun<'a> {
    pipeline: &'a mut Pipeline,
}

impl PipelineRun<'_> {
    /// The processor claiming `path` (relative to the input root).
    pub fn resolve(&self, path: &Path) -> &dyn Processor {
        self.pipeline.resolve(path)
    }
}

impl Drop for PipelineRun<'_> {
    fn drop(&mut self) {
        self.pipeline.end_run();
        log::debug!("Pipeline run ended");
    }
}
