//! YAML data documents rendered through a layout template.

use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::content::{kind_of, merge_yaml_documents};
use crate::core::context::Context;
use crate::core::error::{Result, WebgenError};
use crate::core::traits::{has_extension, Renderer};
use crate::template::TemplateEngine;

/// Key naming the layout template of a data document.
pub const LAYOUT_KEY: &str = "layout";

/// Claims `*.yaml` files. Every document in the file is merged into a copy
/// of the run context and the template named by `layout` is rendered with
/// the result. The output is named `*.html`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlTemplateRenderer;

impl YamlTemplateRenderer {
    /// Creates the renderer.
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for YamlTemplateRenderer {
    type State = TemplateEngine;

    fn name(&self) -> &'static str {
        "YamlTemplate"
    }

    fn matches(&self, path: &Path) -> bool {
        has_extension(path, "yaml")
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
        let fields = merge_yaml_documents(raw, path)?;
        let layout = match fields.get(LAYOUT_KEY) {
            Some(JsonValue::String(layout)) => layout.clone(),
            Some(other) => {
                return Err(WebgenError::render_error(
                    path.to_path_buf(),
                    format!(
                        "`{}` must be a string, found {}",
                        LAYOUT_KEY,
                        kind_of(other)
                    ),
                ))
            }
            None => {
                return Err(WebgenError::render_error(
                    path.to_path_buf(),
                    format!("no `{}` key", LAYOUT_KEY),
                ))
            }
        };

        let mut data = state.data().clone();
        if let JsonValue::Object(map) = &mut data {
            map.extend(fields);
        }
        state.render_named(&layout, &data, path)
    }

    fn rename(&self, path: &Path) -> PathBuf {
        path.with_extension("html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{Outcome, Processor};
    use crate::processors::RenderProcessor;
    use std::fs;
    use tempfile::TempDir;

    fn run_one(files: &[(&str, &str)], page: &str) -> Result<String> {
        let temp = TempDir::new()?;
        let input = temp.path().join("in");
        for (name, body) in files {
            let path = input.join(name);
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(path, body)?;
        }
        let ctx = Context::new(&input, temp.path().join("out"), "20240101000000");
        let mut processor = RenderProcessor::new(
            YamlTemplateRenderer::new(),
            Default::default(),
        );
        processor.start_run(&ctx)?;
        let output = ctx
            .output_root()
            .join(processor.rename(Path::new(page)));
        let outcome = processor.process(&input.join(page), &output)?;
        assert_eq!(outcome, Outcome::Emitted);
        Ok(fs::read_to_string(output)?)
    }

    #[test]
    fn test_rename_to_html() {
        let renderer = YamlTemplateRenderer::new();
        assert_eq!(
            renderer.rename(Path::new("blog/post.yaml")),
            PathBuf::from("blog/post.html")
        );
        assert!(renderer.matches(Path::new("post.yaml")));
        assert!(!renderer.matches(Path::new("post.yml")));
    }

    #[test]
    fn test_renders_layout_with_merged_documents() -> Result<()> {
        let out = run_one(
            &[
                ("_layout.html", "<h1>{{title}}</h1>{{markdown body}}"),
                (
                    "post.yaml",
                    "layout: _layout.html\ntitle: Draft\n---\ntitle: Final\nbody: \"*x*\"\n",
                ),
            ],
            "post.yaml",
        )?;
        assert!(out.starts_with("<h1>Final</h1>"));
        assert!(out.contains("<em>x</em>"));
        Ok(())
    }

    #[test]
    fn test_context_values_visible_to_layout() -> Result<()> {
        let out = run_one(
            &[
                ("_l.html", "{{timestamp}}"),
                ("p.yaml", "layout: _l.html\n"),
            ],
            "p.yaml",
        )?;
        assert_eq!(out, "20240101000000");
        Ok(())
    }

    #[test]
    fn test_missing_layout_is_render_error() {
        let err = run_one(&[("p.yaml", "title: x\n")], "p.yaml").unwrap_err();
        assert!(matches!(err, WebgenError::RenderError { .. }));
        assert!(err.to_string().contains("layout"));

        let err = run_one(&[("p.yaml", "layout: 3\n")], "p.yaml").unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_unknown_layout_is_render_error() {
        let err = run_one(&[("p.yaml", "layout: _nope.html\n")], "p.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
