//! # Content Parsing Module
//!
//! Markup helpers shared by the renderers.
//!
//! ## Key Features
//!
//! - **Markdown to HTML** with tables, strikethrough and footnotes enabled
//! - **Multi-document YAML** parsing, with every document merged into one
//!   mapping (later documents win)
//!
//! Both are behind the Cargo feature of the engine they need.

#[cfg(feature = "yaml")]
use crate::core::error::{Result, WebgenError};
#[cfg(feature = "handlebars")]
use pulldown_cmark::{html, Options as MarkdownOptions, Parser};
#[cfg(feature = "yaml")]
use serde::Deserialize;
#[cfg(feature = "yaml")]
use serde_json::{Map, Value as JsonValue};
#[cfg(feature = "yaml")]
use std::path::Path;

/// Renders Markdown text to an HTML fragment.
///
/// # Examples
///
/// ```
/// use webgen::content::markdown_to_html;
/// assert_eq!(markdown_to_html("# Hi"), "<h1>Hi</h1>\n");
/// ```
#[cfg(feature = "handlebars")]
pub fn markdown_to_html(text: &str) -> String {
    let mut options = MarkdownOptions::empty();
    options.insert(MarkdownOptions::ENABLE_TABLES);
    options.insert(MarkdownOptions::ENABLE_STRIKETHROUGH);
    options.insert(MarkdownOptions::ENABLE_FOOTNOTES);

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(text, options));
    out
}

/// Parses every YAML document in `raw`, in order. `path` names the file
/// in errors, which carry the parser's line and column.
#[cfg(feature = "yaml")]
pub fn parse_yaml_documents(raw: &str, path: &Path) -> Result<Vec<JsonValue>> {
    let mut documents = Vec::new();
    for document in serde_yml::Deserializer::from_str(raw) {
        let value = JsonValue::deserialize(document)
            .map_err(|e| yaml_error(path, &e))?;
        documents.push(value);
    }
    Ok(documents)
}

/// Converts a YAML parse error into a render error at `path`.
#[cfg(feature = "yaml")]
pub(crate) fn yaml_error(path: &Path, e: &serde_yml::Error) -> WebgenError {
    let location = e.location();
    WebgenError::render_error_at(
        path.to_path_buf(),
        e.to_string(),
        location.as_ref().map(|l| l.line()),
        location.as_ref().map(|l| l.column()),
    )
}

/// Merges the top-level mappings of `raw`'s documents. Empty documents are
/// skipped; any other non-mapping document is a render error.
#[cfg(feature = "yaml")]
pub fn merge_yaml_documents(
    raw: &str,
    path: &Path,
) -> Result<Map<String, JsonValue>> {
    let mut merged = Map::new();
    for (index, document) in
        parse_yaml_documents(raw, path)?.into_iter().enumerate()
    {
        match document {
            JsonValue::Object(map) => merged.extend(map),
            JsonValue::Null => {}
            other => {
                return Err(WebgenError::render_error(
                    path.to_path_buf(),
                    format!(
                        "document {} must be a mapping, found {}",
                        index + 1,
                        kind_of(&other)
                    ),
                ))
            }
        }
    }
    Ok(merged)
}

#[cfg(feature = "yaml")]
pub(crate) fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}
