//! Handlebars rendering of `*.html` pages.

use std::path::Path;

use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::traits::{has_extension, Renderer};
use crate::template::TemplateEngine;

/// Renders every `*.html` file as a Handlebars template against the run
/// context. Other pages and `_`-prefixed layouts are available as
/// partials.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTemplateRenderer;

impl HtmlTemplateRenderer {
    /// Creates the renderer.
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for HtmlTemplateRenderer {
    type State = TemplateEngine;

    fn name(&self) -> &'static str {
        "HtmlTemplate"
    }

    fn matches(&self, path: &Path) -> bool {
        has_extension(path, "html")
    }

    fn prepare(&self, context: &Context) -> Result<TemplateEngine> {
        TemplateEngine::load(context)
    }

    fn render(
        &self,
        state: &TemplateEngine,
        raw: &str,
        path: &Path,
    ) -> Result<String> {
        state.render_str(raw, state.data(), path)
    }
}
