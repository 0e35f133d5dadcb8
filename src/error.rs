//! Error handling for twig-ssr
//!
//! This module provides the single error type shared by every stage of the
//! rendering pipeline. All errors implement the standard `std::error::Error`
//! trait and carry enough context (paths, template names, engine traces) to
//! be shown verbatim on the development error page.
//!
//! # Error Types
//!
//! - [`Error::OutsideSandbox`] - a template reference resolved outside the views root
//! - [`Error::TemplateNotFound`] - the template file does not exist
//! - [`Error::MissingFixture`] - a required mock JSON file is absent
//! - [`Error::InvalidFixtureJson`] - a mock JSON file could not be parsed
//! - [`Error::Engine`] - template compilation or evaluation failed
//! - [`Error::Configuration`] - the renderer configuration is invalid
//! - [`Error::Extension`] - a custom filter or function reported a failure
//! - [`Error::Io`] - any other file system failure
//! - [`Error::Json`] - JSON (de)serialisation of options failed
//!
//! # Usage
//!
//! ```rust,ignore
//! use twig_ssr::{Error, TwigRendererBuilder};
//!
//! let renderer = TwigRendererBuilder::new().with_views_path("views").build()?;
//! match renderer.render("about.twig", None) {
//!     Ok(html) => println!("{html}"),
//!     Err(Error::MissingFixture { fixture, .. }) => println!("create {}", fixture.display()),
//!     Err(err) => println!("render failed: {err}"),
//! }
//! ```

use std::borrow::Cow;
use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for all twig-ssr operations
#[derive(Error, Debug)]
pub enum Error {
    /// A template reference resolved to a path outside the views root
    ///
    /// Raised both by request resolution and by the render pipeline itself.
    /// Never retried.
    #[error("Twig template must live inside the views root. Received: {}", path.display())]
    OutsideSandbox { path: PathBuf },

    /// The template file does not exist
    #[error("Twig template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// No mock data exists for the template and missing mocks are not allowed
    #[error("Missing mock data for template {template}. Expected file: {}", fixture.display())]
    MissingFixture { template: String, fixture: PathBuf },

    /// The mock data file exists but is not a valid JSON object
    #[error("Invalid JSON in {}: {detail}", fixture.display())]
    InvalidFixtureJson {
        fixture: PathBuf,
        detail: Cow<'static, str>,
    },

    /// Template compilation or evaluation failed
    ///
    /// The engine message is kept untouched.
    #[error(transparent)]
    Engine(#[from] minijinja::Error),

    /// Invalid renderer configuration
    #[error("Configuration error: {0}")]
    Configuration(Cow<'static, str>),

    /// A custom filter or function failed
    #[error("Extension error: {0}")]
    Extension(Cow<'static, str>),

    /// File system and I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing and serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error with a static string
    pub fn configuration_static(msg: &'static str) -> Self {
        Error::Configuration(Cow::Borrowed(msg))
    }

    /// Create a configuration error with an owned string
    pub fn configuration_owned(msg: String) -> Self {
        Error::Configuration(Cow::Owned(msg))
    }

    /// Create an extension error with a static string
    pub fn extension_static(msg: &'static str) -> Self {
        Error::Extension(Cow::Borrowed(msg))
    }

    /// Create an extension error with an owned string
    ///
    /// Custom filters and functions return this to abort a render:
    ///
    /// ```rust,ignore
    /// use twig_ssr::Error;
    ///
    /// let error = Error::extension_owned(format!("unknown asset: {}", name));
    /// ```
    pub fn extension_owned(msg: String) -> Self {
        Error::Extension(Cow::Owned(msg))
    }

    /// Build an invalid-fixture error from a JSON parse failure
    pub fn invalid_fixture(fixture: PathBuf, source: &serde_json::Error) -> Self {
        Error::InvalidFixtureJson {
            fixture,
            detail: Cow::Owned(source.to_string()),
        }
    }

    /// Whether this error means the requested template file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TemplateNotFound { .. })
    }

    /// Trace text for diagnostics
    ///
    /// Engine errors include the engine's debug information (template
    /// source excerpt and referenced variables) when debug mode is on,
    /// followed by the chain of underlying causes.
    pub fn stack(&self) -> String {
        let mut stack = match self {
            Error::Engine(err) => format!("{:#}", err),
            other => format!("{:?}", other),
        };

        let mut source = self.source();
        while let Some(cause) = source {
            stack.push_str("\ncaused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        stack
    }
}

/// Result type alias for twig-ssr operations
pub type Result<T> = std::result::Result<T, Error>;
