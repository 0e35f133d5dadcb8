//! Configuration types
//!
//! This module contains the option structures shared by the standalone
//! renderer and the dev-server plugin.
//!
//! # Key Types
//!
//! - [`RendererOptions`] - data-only options, deserialisable from JSON
//! - [`Extensions`] - custom filters, functions and the environment hook
//! - [`RendererConfig`] - validated, immutable configuration with resolved roots
//!
//! # Usage
//!
//! Most users go through [`crate::TwigRendererBuilder`]. The data options can
//! also come from a JSON file:
//!
//! ```rust,ignore
//! use twig_ssr::{RendererOptions, TwigRendererBuilder};
//!
//! let options = RendererOptions::from_json_file("twig-ssr.json")?;
//! let renderer = TwigRendererBuilder::new()
//!     .with_options(options)
//!     .add_filter("headline", |args| Ok(args[0].to_string().to_uppercase().into()))
//!     .build()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};
use crate::paths::resolve_to_root;

/// Key under which the front-end version is exposed to templates
pub const VERSION_KEY: &str = "feVersion";

/// Environment variable consulted for the front-end version
pub const VERSION_ENV: &str = "FE_VERSION";

static EXTENSION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid extension name regex"));

/// A custom filter or function
///
/// Receives the positional arguments of the call (for filters the piped
/// value comes first) and returns the value to render.
pub type ExtensionFn = Arc<dyn Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync>;

/// Wrap a closure as an [`ExtensionFn`]
pub fn extension<F>(f: F) -> ExtensionFn
where
    F: Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Hook that receives the engine environment once, at construction
pub type EnvironmentHook = Arc<dyn Fn(&mut minijinja::Environment<'static>) + Send + Sync>;

/// Data-only renderer options
///
/// Every field is optional in JSON and uses camelCase names:
///
/// ```json
/// {
///   "viewsPath": "./src/views",
///   "mockPath": "./mock",
///   "globalData": { "assetsUri": "/assets/" },
///   "namespaces": { "components": "./src/components" },
///   "allowMissingMock": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RendererOptions {
    /// Template directory, relative to the project root
    pub views_path: PathBuf,
    /// Fixture directory, relative to the project root
    pub mock_path: PathBuf,
    /// Outermost data layer
    pub global_data: Map<String, JsonValue>,
    /// `@name/...` include prefixes mapped to directories
    pub namespaces: IndexMap<String, PathBuf>,
    /// Whether templates without a fixture render with an empty data layer
    pub allow_missing_mock: bool,
    /// Include resolution root, defaults to the views root
    pub base: Option<PathBuf>,
    /// Engine debug mode
    pub debug: Option<bool>,
    /// Trace-level logging of the render context
    pub trace: Option<bool>,
    /// Project root override, defaults to the current directory
    pub root: Option<PathBuf>,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            views_path: PathBuf::from("src"),
            mock_path: PathBuf::from("mock"),
            global_data: Map::new(),
            namespaces: IndexMap::new(),
            allow_missing_mock: true,
            base: None,
            debug: None,
            trace: None,
            root: None,
        }
    }
}

impl RendererOptions {
    /// Parse options from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read options from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Code-only options: extensions registered into the template environment
#[derive(Clone, Default)]
pub struct Extensions {
    pub filters: IndexMap<String, ExtensionFn>,
    pub functions: IndexMap<String, ExtensionFn>,
    pub extend: Option<EnvironmentHook>,
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("extend", &self.extend.is_some())
            .finish()
    }
}

impl Extensions {
    /// Reject filter and function names the engine could never call
    pub fn validate(&self) -> Result<()> {
        let entries = self
            .filters
            .keys()
            .map(|name| ("filter", name))
            .chain(self.functions.keys().map(|name| ("function", name)));

        for (kind, name) in entries {
            if !EXTENSION_NAME.is_match(name) {
                return Err(Error::configuration_owned(format!(
                    "invalid {kind} name {name:?}: expected letters, digits and underscores"
                )));
            }
        }
        Ok(())
    }
}

/// Validated configuration with every root resolved to an absolute path
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub project_root: PathBuf,
    pub views_root: PathBuf,
    pub mock_root: PathBuf,
    /// Include resolution root (explicit `base` or the views root)
    pub base_root: PathBuf,
    /// Namespaces with absolute paths, in declaration order
    pub namespaces: IndexMap<String, PathBuf>,
    pub global_data: Map<String, JsonValue>,
    pub allow_missing_mock: bool,
    pub debug: Option<bool>,
    pub trace: bool,
    pub extensions: Extensions,
}

impl RendererConfig {
    /// Resolve `options` against `project_root` and validate `extensions`
    pub fn resolve(
        project_root: PathBuf,
        options: RendererOptions,
        extensions: Extensions,
    ) -> Result<Self> {
        extensions.validate()?;

        let views_root = resolve_to_root(&project_root, Some(&options.views_path));
        let mock_root = resolve_to_root(&project_root, Some(&options.mock_path));
        let base_root = match options.base.as_deref() {
            Some(base) => resolve_to_root(&project_root, Some(base)),
            None => views_root.clone(),
        };
        let namespaces = options
            .namespaces
            .into_iter()
            .map(|(name, path)| {
                let resolved = resolve_to_root(&project_root, Some(&path));
                (name, resolved)
            })
            .collect();

        let mut global_data = Map::new();
        global_data.insert(VERSION_KEY.to_string(), JsonValue::String(default_version()));
        crate::merge::merge(&mut global_data, &options.global_data);

        Ok(Self {
            project_root,
            views_root,
            mock_root,
            base_root,
            namespaces,
            global_data,
            allow_missing_mock: options.allow_missing_mock,
            debug: options.debug,
            trace: options.trace.unwrap_or(false),
            extensions,
        })
    }
}

/// Version string used when the data layers do not provide one
///
/// `FE_VERSION`, then the package version cargo exposes to running
/// binaries, then `"dev"`.
pub fn default_version() -> String {
    version_from(|key| std::env::var(key).ok())
}

/// [`default_version`] over an arbitrary variable lookup; empty values are skipped
pub fn version_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [VERSION_ENV, "CARGO_PKG_VERSION"]
        .iter()
        .filter_map(|key| lookup(*key))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "dev".to_string())
}
