//! Render pipeline
//!
//! [`render_template`] turns one template path into markup: it checks the
//! sandbox, compiles the template, loads its fixture, assembles the data
//! context and evaluates the template. [`TwigRenderer`] wraps the pipeline
//! for use outside a dev server.
//!
//! # Data context
//!
//! The context handed to the engine is built from three layers, lowest
//! precedence first: global data, the template's fixture, per-call locals.
//! On top of the merged layers the pipeline guarantees:
//!
//! - `current`, `page` and `opts` are always mappings
//! - `current.content`, when truthy and not a string, is passed as its JSON text
//! - `feVersion` is always set
//! - `_file` and `_target` describe the template and its output path, and
//!   cannot be overridden by any layer
//!
//! ```rust,ignore
//! use twig_ssr::TwigRendererBuilder;
//! use serde_json::json;
//!
//! let renderer = TwigRendererBuilder::new()
//!     .with_views_path("tests/fixtures/views")
//!     .with_mock_path("tests/fixtures/mock")
//!     .with_global_data(json!({"site_name": "Demo Site"}))
//!     .build()?;
//!
//! let html = renderer.render("about.twig", None)?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, trace};

use crate::builder::TwigRendererBuilder;
use crate::environment::{EngineOptions, TemplateEnvironment};
use crate::error::{Error, Result};
use crate::fixtures::load_mock_data;
use crate::merge::merge_layers;
use crate::paths::{is_within, relative_to, swap_suffix, OUTPUT_SUFFIX};
use crate::types::{default_version, RendererConfig, VERSION_KEY};

/// Keys that are always present in the context as mappings
pub const RESERVED_BUCKETS: [&str; 3] = ["current", "page", "opts"];

/// Context key describing the source template
pub const FILE_KEY: &str = "_file";

/// Context key describing the output the template stands for
pub const TARGET_KEY: &str = "_target";

/// Everything needed to render one template
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Absolute template path, must be inside the views root
    pub template_path: &'a Path,
    pub config: &'a RendererConfig,
    pub environment: &'a TemplateEnvironment,
    /// Highest-precedence data layer
    pub locals: Option<&'a Map<String, JsonValue>>,
}

/// Render one template through the full pipeline
///
/// # Errors
///
/// - [`Error::OutsideSandbox`] when the template is not below the views root
/// - [`Error::TemplateNotFound`] when the template file does not exist
/// - fixture errors from [`load_mock_data`]
/// - [`Error::Engine`] when compilation or evaluation fails
#[tracing::instrument(skip_all, fields(template = %request.template_path.display()))]
pub fn render_template(request: RenderRequest<'_>) -> Result<String> {
    let RenderRequest {
        template_path,
        config,
        environment,
        locals,
    } = request;

    ensure_renderable(template_path, &config.views_root)?;

    let template = environment.compile(&engine_options(template_path, config))?;

    let fixture = load_mock_data(
        template_path,
        &config.views_root,
        &config.mock_root,
        config.allow_missing_mock,
    )?;
    let context = build_context(template_path, config, &fixture, locals);

    if config.trace {
        trace!(keys = ?context.keys().collect::<Vec<_>>(), "render context");
    }

    let started = Instant::now();
    let html = template.render(&JsonValue::Object(context))?;
    debug!(
        elapsed_us = started.elapsed().as_micros() as u64,
        bytes = html.len(),
        "rendered template"
    );
    Ok(html)
}

/// Check that `template_path` is inside `views_root` and exists
pub fn ensure_renderable(template_path: &Path, views_root: &Path) -> Result<()> {
    if !is_within(views_root, template_path) {
        return Err(Error::OutsideSandbox {
            path: template_path.to_path_buf(),
        });
    }
    if !template_path.is_file() {
        return Err(Error::TemplateNotFound {
            path: template_path.to_path_buf(),
        });
    }
    Ok(())
}

/// Engine options for rendering `template_path` under `config`
pub fn engine_options(template_path: &Path, config: &RendererConfig) -> EngineOptions {
    EngineOptions {
        path: template_path.to_path_buf(),
        base: config.base_root.clone(),
        namespaces: (!config.namespaces.is_empty()).then(|| config.namespaces.clone()),
        debug: config.debug,
    }
}

/// Assemble the data context for `template_path`
///
/// Layers are merged into a fresh mapping; none of the inputs is modified.
pub fn build_context(
    template_path: &Path,
    config: &RendererConfig,
    fixture: &Map<String, JsonValue>,
    locals: Option<&Map<String, JsonValue>>,
) -> Map<String, JsonValue> {
    let no_locals = Map::new();
    let mut context = merge_layers(&[
        &config.global_data,
        fixture,
        locals.unwrap_or(&no_locals),
    ]);

    stringify_current_content(&mut context);

    for bucket in RESERVED_BUCKETS {
        let slot = context
            .entry(bucket)
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !slot.is_object() {
            debug!(bucket, "replacing non-mapping reserved bucket");
            *slot = JsonValue::Object(Map::new());
        }
    }

    if !context.get(VERSION_KEY).is_some_and(is_truthy) {
        context.insert(VERSION_KEY.to_string(), JsonValue::String(default_version()));
    }

    let relative = relative_to(&config.views_root, template_path);
    let target = swap_suffix(&relative, OUTPUT_SUFFIX);
    context.insert(
        FILE_KEY.to_string(),
        path_metadata(template_path, &relative),
    );
    context.insert(
        TARGET_KEY.to_string(),
        path_metadata(&config.project_root.join(&target), &target),
    );

    context
}

fn stringify_current_content(context: &mut Map<String, JsonValue>) {
    let Some(JsonValue::Object(current)) = context.get_mut("current") else {
        return;
    };
    if let Some(content) = current.get_mut("content") {
        if is_truthy(content) && !content.is_string() {
            *content = JsonValue::String(content.to_string());
        }
    }
}

fn path_metadata(absolute: &Path, relative: &Path) -> JsonValue {
    let mut meta = Map::new();
    meta.insert(
        "path".to_string(),
        JsonValue::String(absolute.to_string_lossy().into_owned()),
    );
    meta.insert(
        "relative".to_string(),
        JsonValue::String(relative.to_string_lossy().replace('\\', "/")),
    );
    JsonValue::Object(meta)
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(text) => !text.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Standalone renderer for use outside a dev server
///
/// A missing template is always an error here; only the dev server treats
/// it as "not my request".
#[derive(Debug)]
pub struct TwigRenderer {
    config: RendererConfig,
    environment: TemplateEnvironment,
}

impl TwigRenderer {
    /// Create a renderer from a resolved configuration
    pub fn new(config: RendererConfig) -> Self {
        let environment = TemplateEnvironment::new(config.extensions.clone());
        Self {
            config,
            environment,
        }
    }

    /// Start building a renderer
    pub fn builder() -> TwigRendererBuilder {
        TwigRendererBuilder::new()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn environment(&self) -> &TemplateEnvironment {
        &self.environment
    }

    /// Absolute path for `template`: absolute paths verbatim, others below the views root
    pub fn resolve_template<P: AsRef<Path>>(&self, template: P) -> PathBuf {
        let template = template.as_ref();
        if template.is_absolute() {
            template.to_path_buf()
        } else {
            self.config.views_root.join(template)
        }
    }

    /// Render `template` with optional per-call `locals`
    pub fn render<P: AsRef<Path>>(
        &self,
        template: P,
        locals: Option<&Map<String, JsonValue>>,
    ) -> Result<String> {
        let template_path = self.resolve_template(template);
        render_template(RenderRequest {
            template_path: &template_path,
            config: &self.config,
            environment: &self.environment,
            locals,
        })
    }

    /// The data context `render` would hand to the engine
    pub fn render_context<P: AsRef<Path>>(
        &self,
        template: P,
        locals: Option<&Map<String, JsonValue>>,
    ) -> Result<Map<String, JsonValue>> {
        let template_path = self.resolve_template(template);
        ensure_renderable(&template_path, &self.config.views_root)?;
        let fixture = load_mock_data(
            &template_path,
            &self.config.views_root,
            &self.config.mock_root,
            self.config.allow_missing_mock,
        )?;
        Ok(build_context(&template_path, &self.config, &fixture, locals))
    }
}
