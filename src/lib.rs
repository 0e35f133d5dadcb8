//! Server-side rendering of Twig-style page templates
//!
//! Templates live under a views root and are rendered with data from three
//! layers: global data, a JSON fixture mirroring the template's path under
//! the mock root, and per-call locals. Pages can be rendered directly with
//! [`TwigRenderer`] or served from a development server through
//! [`TwigDevPlugin`], which also drives live reload when templates or
//! fixtures change.
//!
//! # Examples
//!
//! ```rust,ignore
//! use twig_ssr::TwigRendererBuilder;
//! use serde_json::json;
//!
//! # fn example() -> twig_ssr::Result<()> {
//! let renderer = TwigRendererBuilder::new()
//!     .with_views_path("src/views")
//!     .with_mock_path("mock")
//!     .with_global_data(json!({"site_name": "Demo Site"}))
//!     .add_function("asset", |args| {
//!         let file = args.first().and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(format!("/static/{file}").into())
//!     })
//!     .build()?;
//!
//! // renders src/views/about.twig with mock/about.json
//! let html = renderer.render("about.twig", None)?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod dev_server;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod fixtures;
pub mod merge;
pub mod paths;
pub mod renderer;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

// Re-export commonly used types
pub use builder::TwigRendererBuilder;
pub use dev_server::{
    inject_client_script, DevHost, DevResponse, LiveUpdate, RequestOutcome, TwigDevPlugin,
    WatchCallback, WatchEvent, WatchEventKind,
};
pub use error::{Error, Result};
pub use renderer::{render_template, RenderRequest, TwigRenderer};
pub use types::{extension, ExtensionFn, Extensions, RendererConfig, RendererOptions};

// Engine types appear in the extend hook signature
pub use minijinja;
