//! Template path resolution and sandboxing
//!
//! Every template that reaches the engine passes through this module. The
//! views root is the sandbox boundary: [`resolve_template_request`] and the
//! render pipeline both refuse paths that resolve outside of it.
//!
//! Containment is decided on path components after lexical normalisation,
//! so `..` segments are collapsed before the check and a sibling directory
//! such as `/srv/views-other` is never mistaken for a child of `/srv/views`.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

/// File suffix of page templates
pub const TEMPLATE_SUFFIX: &str = ".twig";

/// File suffix of mock data fixtures
pub const FIXTURE_SUFFIX: &str = ".json";

/// File suffix of the output a template would produce
pub const OUTPUT_SUFFIX: &str = ".html";

/// URL prefix that maps directly onto the views root
const VIEWS_URL_PREFIX: &str = "views/";

/// Resolve `target` against `root`
///
/// An empty target yields `root`, an absolute target is returned verbatim
/// and anything else is joined onto `root` and normalised.
pub fn resolve_to_root(root: &Path, target: Option<&Path>) -> PathBuf {
    match target {
        None => root.to_path_buf(),
        Some(target) if target.as_os_str().is_empty() => root.to_path_buf(),
        Some(target) if target.is_absolute() => target.to_path_buf(),
        Some(target) => normalize(&root.join(target)),
    }
}

/// Map a dev-server request URL onto a template path inside `views_root`
///
/// Leading slashes are stripped, the remainder is percent-decoded (falling
/// back to the raw text if decoding does not yield UTF-8) and a leading
/// `views/` segment is dropped so `/views/index.twig` maps to
/// `<views_root>/index.twig`.
///
/// # Errors
///
/// [`Error::OutsideSandbox`] when the resolved path leaves `views_root`.
pub fn resolve_template_request(request_url: &str, views_root: &Path) -> Result<PathBuf> {
    let cleaned = request_url.trim_start_matches('/');
    let decoded = safe_decode(cleaned);
    let relative = decoded
        .strip_prefix(VIEWS_URL_PREFIX)
        .unwrap_or(decoded.as_ref());

    let resolved = normalize(&views_root.join(relative));
    if !is_within(views_root, &resolved) {
        return Err(Error::OutsideSandbox { path: resolved });
    }
    Ok(resolved)
}

/// Whether `path` is `root` itself or lies below it
///
/// Both sides are normalised lexically first; the comparison is made per
/// path component.
pub fn is_within(root: &Path, path: &Path) -> bool {
    normalize(path).starts_with(normalize(root))
}

/// Collapse `.` and `..` components without touching the file system
///
/// `..` at the root of an absolute path stays at the root, matching how
/// the operating system resolves it.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized.parent().is_none() && normalized.has_root();
                let ends_in_parent = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::ParentDir)
                );
                if at_root {
                    continue;
                }
                if ends_in_parent {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Drop the query string and fragment from a request URL
pub fn clean_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Whether a cleaned URL or path names a template
pub fn is_template_path(path: &str) -> bool {
    path.ends_with(TEMPLATE_SUFFIX)
}

/// Whether a changed file should trigger a browser reload
pub fn is_watched_file(path: &Path) -> bool {
    let path = path.to_string_lossy();
    path.ends_with(TEMPLATE_SUFFIX) || path.ends_with(FIXTURE_SUFFIX)
}

/// Replace a trailing `.twig` with `suffix`
///
/// Paths without the template suffix are returned unchanged.
pub fn swap_suffix(path: &Path, suffix: &str) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stem) => PathBuf::from(format!("{stem}{suffix}")),
        None => path.to_path_buf(),
    }
}

/// `path` relative to `root`, or `path` itself when it is not below `root`
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    normalize(path)
        .strip_prefix(normalize(root))
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn safe_decode(value: &str) -> Cow<'_, str> {
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn views() -> PathBuf {
        PathBuf::from("/project/src/views")
    }

    #[test]
    fn test_resolve_to_root() {
        let root = Path::new("/project");
        assert_eq!(resolve_to_root(root, None), PathBuf::from("/project"));
        assert_eq!(
            resolve_to_root(root, Some(Path::new(""))),
            PathBuf::from("/project")
        );
        assert_eq!(
            resolve_to_root(root, Some(Path::new("/elsewhere/mock"))),
            PathBuf::from("/elsewhere/mock")
        );
        assert_eq!(
            resolve_to_root(root, Some(Path::new("./src/../mock"))),
            PathBuf::from("/project/mock")
        );
    }

    #[test]
    fn test_request_resolution() {
        assert_eq!(
            resolve_template_request("/index.twig", &views()).unwrap(),
            PathBuf::from("/project/src/views/index.twig")
        );
        assert_eq!(
            resolve_template_request("///views/pages/about.twig", &views()).unwrap(),
            PathBuf::from("/project/src/views/pages/about.twig")
        );
        assert_eq!(
            resolve_template_request("/my%20page.twig", &views()).unwrap(),
            PathBuf::from("/project/src/views/my page.twig")
        );
    }

    #[test]
    fn test_request_traversal_is_rejected() {
        for url in [
            "/../../etc/passwd",
            "/views/../../secret.twig",
            "/..%2F..%2Fetc%2Fpasswd",
            "/%2e%2e/%2e%2e/etc/passwd",
            "/pages/../../views-evil/x.twig",
        ] {
            let err = resolve_template_request(url, &views()).unwrap_err();
            assert!(
                matches!(err, Error::OutsideSandbox { .. }),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_traversal_that_stays_inside_is_allowed() {
        assert_eq!(
            resolve_template_request("/pages/../index.twig", &views()).unwrap(),
            PathBuf::from("/project/src/views/index.twig")
        );
    }

    #[test]
    fn test_invalid_utf8_decoding_falls_back_to_raw() {
        let resolved = resolve_template_request("/bad%FF.twig", &views()).unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/views/bad%FF.twig"));
    }

    #[test]
    fn test_containment_is_segment_aware() {
        let root = views();
        assert!(is_within(&root, &root));
        assert!(is_within(&root, &root.join("a/b.twig")));
        assert!(!is_within(&root, Path::new("/project/src/views-other")));
        assert!(!is_within(&root, Path::new("/project/src/views-other/a.twig")));
        assert!(!is_within(&root, &root.join("../secret.twig")));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("/index.twig?v=1#top"), "/index.twig");
        assert_eq!(clean_url("/index.twig#top?x"), "/index.twig");
        assert_eq!(clean_url("/plain"), "/plain");
        assert!(is_template_path(clean_url("/index.twig?x=1")));
        assert!(!is_template_path(clean_url("/index.html")));
    }

    #[test]
    fn test_suffix_helpers() {
        assert_eq!(
            swap_suffix(Path::new("pages/about.twig"), FIXTURE_SUFFIX),
            PathBuf::from("pages/about.json")
        );
        assert_eq!(
            swap_suffix(Path::new("pages/about.twig"), OUTPUT_SUFFIX),
            PathBuf::from("pages/about.html")
        );
        assert_eq!(
            swap_suffix(Path::new("notes.txt"), OUTPUT_SUFFIX),
            PathBuf::from("notes.txt")
        );
        assert!(is_watched_file(Path::new("/p/mock/index.json")));
        assert!(is_watched_file(Path::new("/p/views/index.twig")));
        assert!(!is_watched_file(Path::new("/p/views/style.css")));
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(&views(), &views().join("pages/about.twig")),
            PathBuf::from("pages/about.twig")
        );
        assert_eq!(relative_to(&views(), &views()), PathBuf::new());
    }
}
