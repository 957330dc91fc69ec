//! # Processors Module
//!
//! The closed set of processors a pipeline can be built from.
//!
//! ## Available Processors
//!
//! - [`ignore`]: claims hidden, temporary and backup files and emits nothing
//! - [`html`]: renders `*.html` files as Handlebars templates
//! - [`yaml`]: renders `*.yaml` data documents through a layout template
//! - [`css`]: generates `*.css` stylesheets from YAML rule documents
//! - [`copy`]: copies anything not claimed earlier
//!
//! Renderers are named through [`ProcessorKind`]. Each kind declares the
//! optional engines it needs; [`check_dependencies`] verifies all of them
//! up front so a misconfigured pipeline fails before any output exists.
//!
//! ## Usage
//!
//! ```rust
//! use std::str::FromStr;
//! use webgen::processors::ProcessorKind;
//!
//! let kind = ProcessorKind::from_str("YamlTemplate").unwrap();
//! assert_eq!(kind.name(), "YamlTemplate");
//! assert!(ProcessorKind::from_str("Jinja").is_err());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::context::Context;
use crate::core::error::{Result, WebgenError};
use crate::core::traits::{has_extension, Outcome, Processor, Renderer};
use crate::fsutil;
use crate::generators::html::finish_html;

/// Catch-all copy processor.
pub mod copy;
/// Stylesheet generation from YAML.
#[cfg(feature = "yaml")]
pub mod css;
/// Handlebars page rendering.
#[cfg(feature = "handlebars")]
pub mod html;
/// Hidden/temporary/backup file filter.
pub mod ignore;
/// YAML data documents rendered through a layout.
#[cfg(all(feature = "handlebars", feature = "yaml"))]
pub mod yaml;

pub use copy::CopyProcessor;
pub use ignore::IgnoreProcessor;

/// Configurable renderer processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    /// YAML data document rendered through its `layout` template.
    YamlTemplate,
    /// HTML file rendered as a Handlebars template.
    HtmlTemplate,
    /// CSS generated from a YAML rule document.
    CssYaml,
}

impl ProcessorKind {
    /// Every registered renderer, in default pipeline order.
    pub const ALL: [ProcessorKind; 3] = [
        ProcessorKind::YamlTemplate,
        ProcessorKind::HtmlTemplate,
        ProcessorKind::CssYaml,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            ProcessorKind::YamlTemplate => "YamlTemplate",
            ProcessorKind::HtmlTemplate => "HtmlTemplate",
            ProcessorKind::CssYaml => "CssYaml",
        }
    }

    /// Optional engines this renderer needs.
    pub fn dependencies(self) -> &'static [Dependency] {
        match self {
            ProcessorKind::YamlTemplate => {
                &[Dependency::Handlebars, Dependency::Yaml]
            }
            ProcessorKind::HtmlTemplate => &[Dependency::Handlebars],
            ProcessorKind::CssYaml => &[Dependency::Yaml],
        }
    }

    /// Instantiates the processor. Dependencies must have been checked.
    pub fn instantiate(
        self,
        options: ProcessorOptions,
    ) -> Result<Box<dyn Processor>> {
        match self {
            ProcessorKind::YamlTemplate => yaml_template(options),
            ProcessorKind::HtmlTemplate => html_template(options),
            ProcessorKind::CssYaml => css_yaml(options),
        }
    }

    #[cfg_attr(
        all(feature = "handlebars", feature = "yaml"),
        allow(dead_code)
    )]
    fn missing(self) -> WebgenError {
        WebgenError::MissingDependency {
            processors: vec![self.name().to_string()],
            dependencies: self
                .dependencies()
                .iter()
                .filter(|d| !d.is_compiled())
                .map(|d| d.name().to_string())
                .collect(),
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProcessorKind {
    type Err = WebgenError;

    fn from_str(s: &str) -> Result<Self> {
        ProcessorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| WebgenError::UnknownProcessor {
                name: s.to_string(),
                known: ProcessorKind::ALL
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Optional engine a renderer can depend on. Each maps to a Cargo
/// feature of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Handlebars templating (plus Markdown for the `markdown` helper).
    Handlebars,
    /// YAML parsing.
    Yaml,
}

impl Dependency {
    /// Feature name.
    pub fn name(self) -> &'static str {
        match self {
            Dependency::Handlebars => "handlebars",
            Dependency::Yaml => "yaml",
        }
    }

    /// Whether the engine is compiled into this build.
    pub fn is_compiled(self) -> bool {
        match self {
            Dependency::Handlebars => cfg!(feature = "handlebars"),
            Dependency::Yaml => cfg!(feature = "yaml"),
        }
    }
}

/// Checks every requested renderer's dependencies against `available`
/// and reports all unmet ones in a single error.
pub fn check_dependencies<F>(
    kinds: &[ProcessorKind],
    available: F,
) -> Result<()>
where
    F: Fn(Dependency) -> bool,
{
    let mut processors = Vec::new();
    let mut dependencies: Vec<&'static str> = Vec::new();

    for kind in kinds {
        let missing: Vec<Dependency> = kind
            .dependencies()
            .iter()
            .copied()
            .filter(|d| !available(*d))
            .collect();
        if missing.is_empty() {
            continue;
        }
        processors.push(kind.name().to_string());
        for dependency in missing {
            if !dependencies.contains(&dependency.name()) {
                dependencies.push(dependency.name());
            }
        }
    }

    if processors.is_empty() {
        Ok(())
    } else {
        Err(WebgenError::MissingDependency {
            processors,
            dependencies: dependencies.into_iter().map(String::from).collect(),
        })
    }
}

/// Options shared by renderer processors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Minify HTML output.
    pub minify_html: bool,
}

/// Adapts a [`Renderer`] into a [`Processor`]: owns the run-scoped engine
/// state and performs the file IO around `render`.
pub struct RenderProcessor<R: Renderer> {
    renderer: R,
    options: ProcessorOptions,
    state: Option<R::State>,
}

impl<R: Renderer> RenderProcessor<R> {
    /// Wraps `renderer`.
    pub fn new(renderer: R, options: ProcessorOptions) -> Self {
        Self {
            renderer,
            options,
            state: None,
        }
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }
}

impl<R: Renderer> fmt::Debug for RenderProcessor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderProcessor")
            .field("renderer", &self.renderer)
            .field("options", &self.options)
            .field("running", &self.state.is_some())
            .finish()
    }
}

impl<R: Renderer> Processor for RenderProcessor<R> {
    fn name(&self) -> &'static str {
        self.renderer.name()
    }

    fn can_handle(&self, path: &Path) -> bool {
        self.renderer.matches(path)
    }

    fn start_run(&mut self, context: &Context) -> Result<()> {
        self.state = Some(self.renderer.prepare(context)?);
        Ok(())
    }

    fn process(&self, input: &Path, output: &Path) -> Result<Outcome> {
        let state = self.state.as_ref().ok_or_else(|| {
            WebgenError::internal_error(format!(
                "{} used outside of a run",
                self.renderer.name()
            ))
        })?;

        let raw = fsutil::read_text(input)?;
        let rendered = self.renderer.render(state, &raw, input)?;
        let rendered = if has_extension(output, "html") {
            finish_html(&rendered, self.options.minify_html)?
        } else {
            rendered
        };

        fsutil::write_atomic(output, rendered.as_bytes())?;
        Ok(Outcome::Emitted)
    }

    fn rename(&self, path: &Path) -> PathBuf {
        self.renderer.rename(path)
    }

    fn end_run(&mut self) {
        self.state = None;
    }
}

#[cfg(feature = "handlebars")]
fn html_template(options: ProcessorOptions) -> Result<Box<dyn Processor>> {
    Ok(Box::new(RenderProcessor::new(
        html::HtmlTemplateRenderer::new(),
        options,
    )))
}

#[cfg(not(feature = "handlebars"))]
fn html_template(_options: ProcessorOptions) -> Result<Box<dyn Processor>> {
    Err(ProcessorKind::HtmlTemplate.missing())
}

#[cfg(all(feature = "handlebars", feature = "yaml"))]
fn yaml_template(options: ProcessorOptions) -> Result<Box<dyn Processor>> {
    Ok(Box::new(RenderProcessor::new(
        yaml::YamlTemplateRenderer::new(),
        options,
    )))
}

#[cfg(not(all(feature = "handlebars", feature = "yaml")))]
fn yaml_template(_options: ProcessorOptions) -> Result<Box<dyn Processor>> {
    Err(ProcessorKind::YamlTemplate.missing())
}

#[cfg(feature = "yaml")]
fn css_yaml(options: ProcessorOptions) -> Result<Box<dyn Processor>> {
    Ok(Box::new(RenderProcessor::new(
        css::CssYamlRenderer::new(),
        options,
    )))
}

#[cfg(not(feature = "yaml"))]
fn css_yaml(_options: ProcessorOptions) -> Result<Box<dyn Processor>> {
    Err(ProcessorKind::CssYaml.missing())
}
