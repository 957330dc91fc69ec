//! # Stylesheets from YAML
//!
//! `*.css` inputs are YAML documents describing rules:
//!
//! ```yaml
//! variables:
//!   accent: "#c33"
//! body:
//!   margin: 0
//!   font-family: [Helvetica, sans-serif]
//!   a:
//!     color: $accent
//!     "&:hover":
//!       background: url(/bg.png?$timestamp)
//! ```
//!
//! renders as
//!
//! ```css
//! body {
//!   margin: 0;
//!   font-family: Helvetica, sans-serif;
//! }
//!
//! body a {
//!   color: #c33;
//! }
//!
//! body a:hover {
//!   background: url(/bg.png?20240101000000);
//! }
//! ```
//!
//! A mapping value opens a nested selector: it is appended to each parent
//! selector with a space, or substituted for `&` when it contains one.
//! Sequence values are joined with `, `. Rules keep document order.

use std::collections::HashMap;
use std::path::Path;

use serde_yml::{Mapping, Value as YamlValue};

use crate::content::yaml_error;
use crate::core::context::Context;
use crate::core::error::{Result, WebgenError};
use crate::core::traits::{has_extension, Renderer};

/// Top-level key holding `$name` substitutions.
pub const VARIABLES_KEY: &str = "variables";

/// Built-in variable holding the run timestamp.
pub const TIMESTAMP_VARIABLE: &str = "timestamp";

/// Generates CSS from YAML rule documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssYamlRenderer;

impl CssYamlRenderer {
    /// Creates the renderer.
    pub fn new() -> Self {
        Self
    }
}

/// Run state of [`CssYamlRenderer`].
#[derive(Debug, Clone)]
pub struct StylesheetRun {
    timestamp: String,
}

impl Renderer for CssYamlRenderer {
    type State = StylesheetRun;

    fn name(&self) -> &'static str {
        "CssYaml"
    }

    fn matches(&self, path: &Path) -> bool {
        has_extension(path, "css")
    }

    fn prepare(&self, context: &Context) -> Result<StylesheetRun> {
        Ok(StylesheetRun {
            timestamp: context.timestamp().to_string(),
        })
    }

    fn render(
        &self,
        state: &StylesheetRun,
        raw: &str,
        path: &Path,
    ) -> Result<String> {
        generate_css(raw, &state.timestamp, path)
    }
}

/// Renders the YAML stylesheet `raw`. `path` names the file in errors.
pub fn generate_css(raw: &str, timestamp: &str, path: &Path) -> Result<String> {
    let document: YamlValue =
        serde_yml::from_str(raw).map_err(|e| yaml_error(path, &e))?;
    let root = match document {
        YamlValue::Mapping(root) => root,
        YamlValue::Null => return Ok(String::new()),
        _ => return Err(fail(path, "stylesheet must be a mapping")),
    };

    let mut sheet = Stylesheet {
        path,
        variables: HashMap::new(),
        rules: Vec::new(),
    };
    if let Some(variables) = root.get(VARIABLES_KEY) {
        sheet.load_variables(variables)?;
    }
    _ = sheet
        .variables
        .insert(TIMESTAMP_VARIABLE.to_string(), timestamp.to_string());

    for (key, block) in root.iter() {
        let selector = sheet.key(key)?;
        if selector == VARIABLES_KEY {
            continue;
        }
        match block {
            YamlValue::Mapping(block) => {
                sheet.add_block(&[selector], block)?
            }
            _ => {
                return Err(fail(
                    path,
                    format!("rule `{}` must be a mapping", selector),
                ))
            }
        }
    }

    Ok(sheet
        .rules
        .iter()
        .map(Rule::to_css)
        .collect::<Vec<_>>()
        .join("\n"))
}

#[derive(Debug)]
struct Rule {
    selectors: Vec<String>,
    declarations: Vec<(String, String)>,
}

impl Rule {
    fn to_css(&self) -> String {
        let mut out = self.selectors.join(", ");
        out.push_str(" {\n");
        for (property, value) in &self.declarations {
            out.push_str(&format!("  {}: {};\n", property, value));
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug)]
struct Stylesheet<'a> {
    path: &'a Path,
    variables: HashMap<String, String>,
    rules: Vec<Rule>,
}

impl Stylesheet<'_> {
    fn load_variables(&mut self, variables: &YamlValue) -> Result<()> {
        let YamlValue::Mapping(variables) = variables else {
            return Err(fail(self.path, "`variables` must be a mapping"));
        };
        for (name, value) in variables.iter() {
            let name = self.key(name)?;
            let value = self.scalar(value).ok_or_else(|| {
                fail(
                    self.path,
                    format!("variable `{}` must be a scalar", name),
                )
            })?;
            _ = self.variables.insert(name, value);
        }
        Ok(())
    }

    /// Emits the rule for `block` (when it has declarations) followed by
    /// its nested rules.
    fn add_block(&mut self, selectors: &[String], block: &Mapping) -> Result<()> {
        let index = self.rules.len();
        self.rules.push(Rule {
            selectors: selectors.to_vec(),
            declarations: Vec::new(),
        });

        let mut declarations = Vec::new();
        for (key, value) in block.iter() {
            let key = self.key(key)?;
            match value {
                YamlValue::Mapping(nested) => {
                    let nested_selectors = nest(selectors, &key);
                    self.add_block(&nested_selectors, nested)?;
                }
                YamlValue::Sequence(items) => {
                    let parts = items
                        .iter()
                        .map(|item| self.value(&key, item))
                        .collect::<Result<Vec<_>>>()?;
                    declarations.push((key, parts.join(", ")));
                }
                other => {
                    let value = self.value(&key, other)?;
                    declarations.push((key, value));
                }
            }
        }

        if declarations.is_empty() {
            _ = self.rules.remove(index);
        } else {
            self.rules[index].declarations = declarations;
        }
        Ok(())
    }

    fn key(&self, key: &YamlValue) -> Result<String> {
        self.scalar(key)
            .ok_or_else(|| fail(self.path, "selectors and properties must be scalars"))
    }

    fn value(&self, property: &str, value: &YamlValue) -> Result<String> {
        let text = self.scalar(value).ok_or_else(|| {
            fail(
                self.path,
                format!("value of `{}` must be a scalar", property),
            )
        })?;
        self.substitute(&text)
    }

    fn scalar(&self, value: &YamlValue) -> Option<String> {
        match value {
            YamlValue::String(s) => Some(s.clone()),
            YamlValue::Number(n) => Some(n.to_string()),
            YamlValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Replaces `$name` references. A `$` not followed by a name is kept.
    fn substitute(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('$') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .unwrap_or(after.len());
            if len == 0 {
                out.push('$');
            } else {
                let name = &after[..len];
                let value = self.variables.get(name).ok_or_else(|| {
                    fail(self.path, format!("undefined variable `${}`", name))
                })?;
                out.push_str(value);
            }
            rest = &after[len..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Combines every parent selector with every comma-separated part of
/// `child`.
fn nest(parents: &[String], child: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    for parent in parents {
        for part in child.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.contains('&') {
                selectors.push(part.replace('&', parent));
            } else {
                selectors.push(format!("{} {}", parent, part));
            }
        }
    }
    selectors
}

fn fail<S: Into<String>>(path: &Path, message: S) -> WebgenError {
    WebgenError::render_error(path.to_path_buf(), message)
}
