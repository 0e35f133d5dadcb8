//! Builder pattern API for renderer and plugin configuration
//!
//! This module provides a fluent API for assembling [`RendererOptions`] and
//! [`Extensions`] before they are validated into a [`RendererConfig`].

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::dev_server::TwigDevPlugin;
use crate::error::{Error, Result};
use crate::paths::resolve_to_root;
use crate::renderer::TwigRenderer;
use crate::types::*;

/// Builder for [`TwigRenderer`] and [`TwigDevPlugin`]
///
/// # Examples
///
/// ```rust,ignore
/// use twig_ssr::TwigRendererBuilder;
/// use serde_json::json;
///
/// let renderer = TwigRendererBuilder::new()
///     .with_views_path("./src/views")
///     .with_mock_path("./mock")
///     .with_global_data(json!({"assetsUri": "/assets/"}))
///     .add_filter("headline", |args| {
///         let text = args.first().and_then(|v| v.as_str()).unwrap_or_default();
///         Ok(text.to_uppercase().into())
///     })
///     .add_function("asset", |args| {
///         let file = args.first().and_then(|v| v.as_str()).unwrap_or_default();
///         Ok(format!("/assets/{file}").into())
///     })
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct TwigRendererBuilder {
    options: RendererOptions,
    extensions: Extensions,
    invalid_global_data: Option<&'static str>,
}

impl TwigRendererBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all data options at once
    pub fn with_options(mut self, options: RendererOptions) -> Self {
        self.options = options;
        self
    }

    /// Project root; relative paths are taken from the current directory
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.options.root = Some(root.into());
        self
    }

    /// Template directory
    pub fn with_views_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.views_path = path.into();
        self
    }

    /// Fixture directory
    pub fn with_mock_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.mock_path = path.into();
        self
    }

    /// Replace the global data layer; must be a JSON object
    pub fn with_global_data(mut self, data: JsonValue) -> Self {
        match data {
            JsonValue::Object(map) => {
                self.options.global_data = map;
                self.invalid_global_data = None;
            }
            _ => self.invalid_global_data = Some("global data must be a JSON object"),
        }
        self
    }

    /// Set one global data key
    pub fn add_global<K: Into<String>, V: Into<JsonValue>>(mut self, key: K, value: V) -> Self {
        self.options.global_data.insert(key.into(), value.into());
        self
    }

    /// Map `@name/...` includes onto `path`
    pub fn with_namespace<N: Into<String>, P: Into<PathBuf>>(mut self, name: N, path: P) -> Self {
        self.options.namespaces.insert(name.into(), path.into());
        self
    }

    /// Whether templates without a fixture may render
    pub fn with_allow_missing_mock(mut self, allow: bool) -> Self {
        self.options.allow_missing_mock = allow;
        self
    }

    /// Include resolution root
    pub fn with_base<P: Into<PathBuf>>(mut self, base: P) -> Self {
        self.options.base = Some(base.into());
        self
    }

    /// Engine debug mode
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.options.debug = Some(enabled);
        self
    }

    /// Trace-level logging of render contexts
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.options.trace = Some(enabled);
        self
    }

    /// Register a filter; the piped value is the first argument
    pub fn add_filter<N, F>(mut self, name: N, filter: F) -> Self
    where
        N: Into<String>,
        F: Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync + 'static,
    {
        self.extensions.filters.insert(name.into(), Arc::new(filter));
        self
    }

    /// Register a function
    pub fn add_function<N, F>(mut self, name: N, function: F) -> Self
    where
        N: Into<String>,
        F: Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync + 'static,
    {
        self.extensions
            .functions
            .insert(name.into(), Arc::new(function));
        self
    }

    /// Hook run once against the engine when it is first constructed
    pub fn with_extend<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut minijinja::Environment<'static>) + Send + Sync + 'static,
    {
        self.extensions.extend = Some(Arc::new(hook));
        self
    }

    /// Validate and resolve the configuration
    pub fn build_config(self) -> Result<RendererConfig> {
        let (options, extensions) = self.into_parts()?;
        let project_root = project_root(&options)?;
        RendererConfig::resolve(project_root, options, extensions)
    }

    /// Build a standalone renderer
    pub fn build(self) -> Result<TwigRenderer> {
        Ok(TwigRenderer::new(self.build_config()?))
    }

    /// Build a dev-server plugin
    pub fn build_plugin(self) -> Result<TwigDevPlugin> {
        let (options, extensions) = self.into_parts()?;
        TwigDevPlugin::new(options, extensions)
    }

    fn into_parts(self) -> Result<(RendererOptions, Extensions)> {
        if let Some(msg) = self.invalid_global_data {
            return Err(Error::configuration_static(msg));
        }
        Ok((self.options, self.extensions))
    }
}

/// Project root for `options`: `root` resolved against the current directory, or the current directory
pub(crate) fn project_root(options: &RendererOptions) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_to_root(&cwd, options.root.as_deref()))
}
