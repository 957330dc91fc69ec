//! # Template Rendering Module
//!
//! Per-run Handlebars engine shared by the HTML and YAML renderers.
//!
//! ## Features
//!
//! - Every `*.html` file under the input root is registered as a template
//!   and as a partial under its `/`-separated relative path, so layouts
//!   such as `_layout.html` can be referenced from pages and data files
//! - A `markdown` helper turning Markdown text into HTML
//! - Templates that fail to compile are remembered and reported when a
//!   page asks for them, instead of failing the whole run
//!
//! The engine is created in `start_run` and dropped in `end_run`; nothing
//! is shared between runs.

use crate::content::markdown_to_html;
use crate::core::context::Context;
use crate::core::error::{Result, WebgenError};
use crate::generators::list_input_files;
use handlebars::{
    Context as HandlebarsContext, Handlebars, Helper, HelperResult, Output,
    RenderContext, RenderError, RenderErrorReason,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

/// A Handlebars registry loaded from one run's input tree.
pub struct TemplateEngine {
    engine: Handlebars<'static>,
    broken: BTreeMap<String, String>,
    data: JsonValue,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("templates", &self.template_names())
            .field("broken", &self.broken.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateEngine {
    /// Builds the engine for the run described by `context`.
    pub fn load(context: &Context) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::html_escape);
        handlebars.register_helper("markdown", Box::new(markdown_helper));

        let mut engine = Self {
            engine: handlebars,
            broken: BTreeMap::new(),
            data: context.to_json(),
        };
        engine.load_templates(context.input_root(), context.output_root())?;
        Ok(engine)
    }

    /// Context data every render starts from.
    pub fn data(&self) -> &JsonValue {
        &self.data
    }

    /// Names of the successfully registered templates, sorted.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.engine.get_templates().keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a template named `name` compiled.
    pub fn has_template(&self, name: &str) -> bool {
        self.engine.has_template(name)
    }

    /// Renders raw template text; `path` names the file in errors.
    pub fn render_str(
        &self,
        template: &str,
        data: &JsonValue,
        path: &Path,
    ) -> Result<String> {
        self.engine
            .render_template(template, data)
            .map_err(|e| render_failure(path, &e))
    }

    /// Renders the registered template `name`; `path` names the file that
    /// asked for it.
    pub fn render_named(
        &self,
        name: &str,
        data: &JsonValue,
        path: &Path,
    ) -> Result<String> {
        if let Some(reason) = self.broken.get(name) {
            return Err(WebgenError::render_error(
                path.to_path_buf(),
                format!("template `{}` failed to compile: {}", name, reason),
            ));
        }
        if !self.engine.has_template(name) {
            return Err(WebgenError::render_error(
                path.to_path_buf(),
                format!("template `{}` not found", name),
            ));
        }
        self.engine
            .render(name, data)
            .map_err(|e| render_failure(path, &e))
    }

    /// Registers every `*.html` file below `root`, skipping an output
    /// root nested inside it.
    fn load_templates(&mut self, root: &Path, output_root: &Path) -> Result<()> {
        for relative in list_input_files(root, Some(output_root))? {
            if relative.extension().and_then(|s| s.to_str()) != Some("html") {
                continue;
            }

            let Some(name) = template_name(&relative) else {
                log::warn!(
                    "Skipping template with non UTF-8 name: {}",
                    relative.display()
                );
                continue;
            };
            let Ok(source) = std::fs::read_to_string(root.join(&relative)) else {
                _ = self
                    .broken
                    .insert(name, "file is not readable UTF-8".to_string());
                continue;
            };

            let registered = self
                .engine
                .register_template_string(&name, &source)
                .and_then(|()| self.engine.register_partial(&name, &source));
            if let Err(e) = registered {
                log::debug!("Template {} failed to compile: {}", name, e);
                _ = self.broken.insert(name, e.to_string());
            }
        }
        Ok(())
    }
}

fn template_name(relative: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> =
        relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn render_failure(path: &Path, e: &RenderError) -> WebgenError {
    WebgenError::render_error_at(
        path.to_path_buf(),
        e.to_string(),
        e.line_no,
        e.column_no,
    )
}

/// `{{markdown text}}`: renders its first parameter as Markdown. The
/// output is written unescaped.
fn markdown_helper(
    h: &Helper,
    _: &Handlebars,
    _: &HandlebarsContext,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let text = match h.param(0).map(|p| p.value()) {
        Some(JsonValue::String(text)) => text.as_str(),
        Some(JsonValue::Null) | None => "",
        Some(other) => {
            return Err(RenderError::from(RenderErrorReason::Other(format!(
                "markdown helper expects a string, got {}",
                other
            ))))
        }
    };
    out.write(&markdown_to_html(text))?;
    Ok(())
}
