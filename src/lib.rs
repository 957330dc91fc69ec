// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Webgen Library
//!
//! Webgen turns a source tree into a generated website through an ordered
//! chain of processors, keeps generated sites as immutable timestamped
//! versions, and deploys exactly the files a run produced.
//!
//! The main entry points are:
//!
//! - [`Pipeline`]: the processor chain (`Ignore`, configured renderers,
//!   `Copy`).
//! - [`Generator`]: runs a pipeline over an input tree and records a
//!   [`Manifest`] of what it wrote.
//! - [`VersionStore`]: versioned generation, promotion and garbage
//!   collection below a versions root.
//! - [`deploy`](mod@deploy): manifest-driven deploy and undeploy.

#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/webgen")]

/// Module containing configuration, errors, the run context and the
/// processor traits.
pub mod core;

/// Provides the `webgen` command-line interface.
pub mod cli;

/// Provides Markdown and YAML parsing shared by the renderers.
pub mod content;

/// Provides manifest-driven deployment.
pub mod deploy;

/// Provides atomic file helpers.
pub mod fsutil;

/// Provides the generation driver and output post-processing.
pub mod generators;

/// Provides the output manifest.
pub mod manifest;

/// Provides the ordered processor chain.
pub mod pipeline;

/// Provides the built-in processors.
pub mod processors;

/// Provides the Handlebars template engine used by the renderers.
#[cfg(feature = "handlebars")]
pub mod template;

/// Provides versioned generation and release management.
pub mod versions;

pub use crate::core::config::{ConfigBuilder, SiteConfig};
pub use crate::core::context::Context;
pub use crate::core::error::{FileFailure, Result, WebgenError};
pub use crate::core::traits::{Outcome, Processor, Renderer};
pub use crate::generators::{GenerationReport, Generator};
pub use crate::manifest::Manifest;
pub use crate::pipeline::Pipeline;
pub use crate::versions::{VersionSelector, VersionStore};
