//! Template engine environment
//!
//! [`TemplateEnvironment`] owns the engine handle for one renderer or plugin.
//! The engine is built on first use, exactly once, with every configured
//! filter and function registered. The base engine never stores templates:
//! each render works on a clone that loads the page and its includes from
//! disk, so edits show up on the next request.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use minijinja::value::{Rest, Value};
use minijinja::{Environment, ErrorKind};
use once_cell::sync::OnceCell;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::Result;
use crate::paths::{is_within, normalize, relative_to};
use crate::types::{ExtensionFn, Extensions};

/// Per-render engine options
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Absolute path of the page template
    pub path: PathBuf,
    /// Root for include resolution
    pub base: PathBuf,
    /// `@name/...` include prefixes, absent when none are configured
    pub namespaces: Option<IndexMap<String, PathBuf>>,
    /// Engine debug mode, engine default when absent
    pub debug: Option<bool>,
}

impl EngineOptions {
    /// Name the page template is registered under
    ///
    /// The path relative to the include root when the template lives below
    /// it, so `{% include %}` names and the page name agree; the absolute
    /// path otherwise.
    pub fn template_name(&self) -> String {
        if is_within(&self.base, &self.path) {
            relative_to(&self.base, &self.path)
                .to_string_lossy()
                .replace('\\', "/")
        } else {
            self.path.to_string_lossy().into_owned()
        }
    }
}

/// Lazily constructed, shared engine handle
pub struct TemplateEnvironment {
    extensions: Extensions,
    engine: OnceCell<Environment<'static>>,
}

impl std::fmt::Debug for TemplateEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEnvironment")
            .field("extensions", &self.extensions)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl TemplateEnvironment {
    /// Create an environment; nothing is built until [`TemplateEnvironment::get`]
    pub fn new(extensions: Extensions) -> Self {
        Self {
            extensions,
            engine: OnceCell::new(),
        }
    }

    /// The engine, constructing it on first call
    pub fn get(&self) -> &Environment<'static> {
        self.engine.get_or_init(|| build_engine(&self.extensions))
    }

    /// Whether the engine has been constructed yet
    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    /// Compile the page template described by `options`
    ///
    /// The template source is read from disk and compiled into a fresh
    /// engine clone; nothing is kept between calls.
    pub fn compile(&self, options: &EngineOptions) -> Result<CompiledTemplate> {
        let mut env = self.get().clone();
        if let Some(debug) = options.debug {
            env.set_debug(debug);
        }
        env.set_loader(template_loader(
            options.base.clone(),
            options.namespaces.clone().unwrap_or_default(),
        ));

        let name = options.template_name();
        let source = std::fs::read_to_string(&options.path)?;
        env.add_template_owned(name.clone(), source)?;
        debug!(template = %name, "compiled template");

        Ok(CompiledTemplate { env, name })
    }
}

/// A template compiled for a single render
pub struct CompiledTemplate {
    env: Environment<'static>,
    name: String,
}

impl CompiledTemplate {
    /// Name the template was registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the template with `context`
    pub fn render(&self, context: &JsonValue) -> Result<String> {
        let template = self.env.get_template(&self.name)?;
        Ok(template.render(context)?)
    }
}

fn build_engine(extensions: &Extensions) -> Environment<'static> {
    let mut env = Environment::new();

    for (name, filter) in &extensions.filters {
        let filter = ExtensionFn::clone(filter);
        env.add_filter(name.clone(), move |args: Rest<Value>| {
            call_extension(&filter, &args)
        });
    }
    for (name, function) in &extensions.functions {
        let function = ExtensionFn::clone(function);
        env.add_function(name.clone(), move |args: Rest<Value>| {
            call_extension(&function, &args)
        });
    }
    if let Some(extend) = &extensions.extend {
        extend(&mut env);
    }

    debug!(
        filters = extensions.filters.len(),
        functions = extensions.functions.len(),
        "template environment constructed"
    );
    env
}

fn call_extension(
    extension: &ExtensionFn,
    args: &[Value],
) -> std::result::Result<Value, minijinja::Error> {
    let json_args = args
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| {
            minijinja::Error::new(ErrorKind::InvalidOperation, "argument is not representable as JSON")
                .with_source(err)
        })?;

    let result = extension(&json_args)
        .map_err(|err| minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string()))?;
    Ok(Value::from_serialize(&result))
}

fn template_loader(
    base: PathBuf,
    namespaces: IndexMap<String, PathBuf>,
) -> impl Fn(&str) -> std::result::Result<Option<String>, minijinja::Error> + Send + Sync + 'static
{
    move |name: &str| {
        let Some(path) = locate_template(&base, &namespaces, name) else {
            return Ok(None);
        };
        match std::fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
            Err(err) => Err(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {}", path.display()),
            )
            .with_source(err)),
        }
    }
}

/// Map an include name onto a file below its root
///
/// `@name/path` and `name::path` select a namespace; anything else is
/// relative to `base`. Names escaping their root resolve to nothing.
fn locate_template(
    base: &Path,
    namespaces: &IndexMap<String, PathBuf>,
    name: &str,
) -> Option<PathBuf> {
    let (root, rest) = if let Some(qualified) = name.strip_prefix('@') {
        let (namespace, rest) = qualified.split_once('/')?;
        (namespaces.get(namespace)?.as_path(), rest)
    } else if let Some((namespace, rest)) = name.split_once("::") {
        (namespaces.get(namespace)?.as_path(), rest)
    } else {
        (base, name)
    };

    let candidate = normalize(&root.join(rest.trim_start_matches('/')));
    is_within(root, &candidate).then_some(candidate)
}
