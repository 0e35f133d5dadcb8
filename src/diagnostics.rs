//! In-browser error reporting
//!
//! When a render fails in the dev server the browser gets a small HTML page
//! with the error message and trace instead of a blank response.

use std::borrow::Cow;

use crate::error::Error;

/// Escape `& < > " '` for inclusion in HTML text or attribute values
///
/// Input without any of those characters is returned borrowed.
pub fn escape_html(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }

    let mut escaped = String::with_capacity(input.len() + input.len() / 4);
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Diagnostic page for `error`
pub fn render_error_page(error: &Error) -> String {
    error_page(&error.to_string(), &error.stack())
}

/// Diagnostic page for an arbitrary message and trace
pub fn error_page(message: &str, stack: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
    <head>
        <meta charset="utf-8" />
        <title>Twig Render Error</title>
        <style>
            body {{ font-family: system-ui, sans-serif; padding: 2rem; color: #f5f5f5; background: #1a1a1a; }}
            pre {{ background: #2a2a2a; padding: 1rem; border-radius: 8px; overflow-x: auto; }}
        </style>
    </head>
    <body>
        <h1>Twig render error</h1>
        <p>{}</p>
        <pre>{}</pre>
    </body>
</html>"#,
        escape_html(message),
        escape_html(stack)
    )
}
