//! Test utilities for rendered pages
//!
//! Helpers for asserting on the HTML a template renders to, plus a few
//! filesystem helpers for laying out throwaway projects. Only built for
//! tests or with the `test-utils` feature.

use std::path::{Path, PathBuf};

use dom_query::Document;

/// Normalize HTML for comparison by parsing and re-serializing
///
/// # Examples
///
/// ```rust,ignore
/// use twig_ssr::test_utils::normalize_html;
///
/// let html1 = "<div  class=\"test\" ><p>Hello</p></div>";
/// let html2 = "<div class=\"test\"><p>Hello</p></div>";
///
/// assert_eq!(normalize_html(html1), normalize_html(html2));
/// ```
pub fn normalize_html(html: &str) -> String {
    Document::from(html).html().trim().to_string()
}

/// Assert that two HTML strings are equivalent after normalization
#[macro_export]
macro_rules! assert_html_eq {
    ($left:expr, $right:expr) => {{
        let left_normalized = $crate::test_utils::normalize_html($left);
        let right_normalized = $crate::test_utils::normalize_html($right);

        if left_normalized != right_normalized {
            panic!(
                "HTML assertion failed\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}",
                left_normalized, right_normalized
            );
        }
    }};
}

/// Text content of the page body with whitespace collapsed
pub fn extract_text(html: &str) -> String {
    let doc = Document::from(html);
    let body = doc.select("body");
    let text = if !body.nodes().is_empty() { body.text() } else { doc.text() };

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed text of every element matching `selector`
pub fn extract_text_by_selector(html: &str, selector: &str) -> Vec<String> {
    let doc = Document::from(html);
    doc.select(selector)
        .nodes()
        .iter()
        .map(|node| node.text().trim().to_string())
        .collect()
}

/// Value of `attr` on every element matching `selector` that has it
pub fn extract_attrs_by_selector(html: &str, selector: &str, attr: &str) -> Vec<String> {
    let doc = Document::from(html);
    doc.select(selector)
        .nodes()
        .iter()
        .filter_map(|node| node.attr(attr).map(|v| v.to_string()))
        .collect()
}

/// Count elements matching a selector
pub fn count_elements(html: &str, selector: &str) -> usize {
    Document::from(html).select(selector).nodes().len()
}

/// Check if HTML contains an element matching a selector
pub fn has_element(html: &str, selector: &str) -> bool {
    count_elements(html, selector) > 0
}

/// The checked-in sample project used by the integration tests
pub fn fixture_project() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Write `contents` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, contents: &str) -> std::io::Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    Ok(path)
}

/// Recursively copy `from` into `to`
pub fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
