//! # HTML Output Finishing
//!
//! Post-processing applied to every HTML document a renderer emits before
//! it is written to the output tree.
//!
//! # Examples
//!
//! ```rust
//! use webgen::generators::html::finish_html;
//!
//! let page = "<p>\n  Hello   <b>World</b>\n</p>\n<!-- note -->";
//! let minified = finish_html(page, true).unwrap();
//! assert!(!minified.contains("<!--"));
//! assert_eq!(finish_html(page, false).unwrap(), page);
//! ```

use minify_html::{minify, Cfg};

use crate::core::error::{Result, WebgenError};

/// Returns `content` unchanged, or minified (inline CSS and JS included)
/// when `minify_output` is set.
pub fn finish_html(content: &str, minify_output: bool) -> Result<String> {
    if !minify_output {
        return Ok(content.to_string());
    }
    minify_html(content)
}

/// Minifies HTML content using the `minify-html` crate.
fn minify_html(content: &str) -> Result<String> {
    let cfg = Cfg {
        do_not_minify_doctype: true,
        keep_closing_tags: true,
        minify_css: true,
        minify_js: true,
        ..Cfg::default()
    };
    let minified = minify(content.as_bytes(), &cfg);
    log::trace!(
        "Minified HTML from {} to {} bytes",
        content.len(),
        minified.len()
    );
    String::from_utf8(minified).map_err(|e| {
        WebgenError::internal_error(format!(
            "HTML minification produced invalid UTF-8: {}",
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_without_minification() {
        let page = "<html>\n  <body>  x  </body>\n</html>\n";
        assert_eq!(finish_html(page, false).unwrap(), page);
    }

    #[test]
    fn test_minification_strips_comments_and_whitespace() {
        let page = "<!DOCTYPE html>\n<html>\n  <body>\n    <!-- hidden -->\n    <p>Hi</p>\n  </body>\n</html>\n";
        let out = finish_html(page, true).unwrap();
        assert!(!out.contains("hidden"));
        assert!(out.contains("<p>Hi</p>"));
        assert!(out.len() < page.len());
    }

    #[test]
    fn test_minifies_inline_css() {
        let page = "<style>\n  body {\n    margin : 0 ;\n  }\n</style>";
        let out = finish_html(page, true).unwrap();
        assert!(out.contains("margin:0"));
    }
}
