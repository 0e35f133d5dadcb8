//! Dev-server integration
//!
//! [`TwigDevPlugin`] plugs the render pipeline into a host development
//! server. The host owns the HTTP stack, the file watcher and the
//! live-update channel and exposes them through the [`DevHost`] trait; the
//! plugin decides which requests it serves, renders them, and turns file
//! changes and render failures into [`LiveUpdate`] messages.
//!
//! # Request lifecycle
//!
//! ```text
//! RECEIVED ── not *.twig ───────────────────────────────▶ PASS_THROUGH
//!    │
//!    ├──── *.twig, file missing ────────────────────────▶ PASS_THROUGH
//!    │
//!    └──── *.twig, file exists ─▶ RENDERING ─┬─ ok ──▶ transform_html ─▶ 200
//!                                            └─ err ─▶ notify(error) ──▶ 500
//! ```
//!
//! # Wiring a host
//!
//! ```rust,ignore
//! let plugin = Arc::new(TwigRendererBuilder::new().with_views_path("src/views").build_plugin()?);
//! plugin.configure_server(host.clone());
//!
//! // in the host's request handler:
//! match plugin.handle_request(host.as_ref(), &request_url).await {
//!     RequestOutcome::PassThrough => next(request).await,
//!     RequestOutcome::Respond(response) => response.into(),
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dom_query::Document;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::builder::project_root;
use crate::diagnostics::{escape_html, render_error_page};
use crate::environment::TemplateEnvironment;
use crate::error::{Error, Result};
use crate::paths::{clean_url, is_template_path, is_watched_file, resolve_template_request};
use crate::renderer::{render_template, RenderRequest};
use crate::types::{Extensions, RendererConfig, RendererOptions};

/// Name the plugin registers under
pub const PLUGIN_NAME: &str = "twig-ssr";

/// Content type of every response the plugin produces
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Message pushed over the host's live-update channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LiveUpdate {
    /// Reload the whole page
    FullReload,
    /// Show an error overlay
    Error { err: ErrorPayload },
}

/// Error details carried by [`LiveUpdate::Error`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub stack: String,
}

impl LiveUpdate {
    /// Error notification for `error`
    pub fn error(error: &Error) -> Self {
        LiveUpdate::Error {
            err: ErrorPayload {
                message: error.to_string(),
                stack: error.stack(),
            },
        }
    }
}

/// Kind of file-system change reported by the host watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
}

/// A file-system change reported by the host watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new<P: Into<PathBuf>>(kind: WatchEventKind, path: P) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Whether this change should reload the browser
    pub fn triggers_reload(&self) -> bool {
        is_watched_file(&self.path)
    }
}

/// Callback the host invokes for every watcher event
pub type WatchCallback = Box<dyn Fn(&WatchEvent) + Send + Sync>;

/// Services the host dev server provides to the plugin
#[async_trait]
pub trait DevHost: Send + Sync {
    /// Watch `paths` and call `on_event` for every change
    fn watch(&self, paths: Vec<PathBuf>, on_event: WatchCallback);

    /// Push a message to connected browsers
    fn notify(&self, message: LiveUpdate);

    /// Post-process rendered HTML before it is sent
    async fn transform_html(&self, _url: &str, html: String) -> String {
        html
    }
}

/// Response produced for a template request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl DevResponse {
    fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: HTML_CONTENT_TYPE,
            body,
        }
    }
}

/// What the host should do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Not a template the plugin serves; hand it to the next handler
    PassThrough,
    Respond(DevResponse),
}

/// Dev-server plugin rendering `.twig` requests
///
/// Renders run on tokio's blocking pool, so a slow template or fixture read
/// never stalls other requests on the host runtime.
#[derive(Debug)]
pub struct TwigDevPlugin {
    options: RendererOptions,
    config: Arc<RendererConfig>,
    environment: Arc<TemplateEnvironment>,
}

impl TwigDevPlugin {
    /// Create a plugin rooted at `options.root` or the current directory
    pub fn new(options: RendererOptions, extensions: Extensions) -> Result<Self> {
        let root = project_root(&options)?;
        let environment = Arc::new(TemplateEnvironment::new(extensions.clone()));
        let config = Arc::new(RendererConfig::resolve(root, options.clone(), extensions)?);
        Ok(Self {
            options,
            config,
            environment,
        })
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn config(&self) -> &RendererConfig {
        self.config.as_ref()
    }

    /// Host hook: the project root is known
    ///
    /// Views, fixture, base and namespace paths are re-resolved against it.
    pub fn config_resolved<P: Into<PathBuf>>(&mut self, root: P) -> Result<()> {
        self.config = Arc::new(RendererConfig::resolve(
            root.into(),
            self.options.clone(),
            self.config.extensions.clone(),
        )?);
        debug!(root = %self.config.project_root.display(), "project root resolved");
        Ok(())
    }

    /// Host hook: the server is starting
    ///
    /// Watches the views and fixture roots that exist and sends a full
    /// reload whenever a template or fixture changes.
    pub fn configure_server(&self, host: Arc<dyn DevHost>) {
        let mut targets: Vec<PathBuf> = Vec::new();
        for root in [&self.config.views_root, &self.config.mock_root] {
            if root.exists() && !targets.contains(root) {
                targets.push(root.clone());
            }
        }
        info!(targets = ?targets, "watching templates and mock data");

        let notifier: Weak<dyn DevHost> = Arc::downgrade(&host);
        host.watch(
            targets,
            Box::new(move |event: &WatchEvent| {
                if !event.triggers_reload() {
                    return;
                }
                if let Some(host) = notifier.upgrade() {
                    debug!(path = %event.path.display(), kind = ?event.kind, "reloading");
                    host.notify(LiveUpdate::FullReload);
                }
            }),
        );
    }

    /// Whether the plugin serves `url` (query and fragment ignored)
    pub fn is_template_request(url: &str) -> bool {
        is_template_path(clean_url(url))
    }

    /// Serve one request
    #[tracing::instrument(skip(self, host))]
    pub async fn handle_request(&self, host: &dyn DevHost, url: &str) -> RequestOutcome {
        if !Self::is_template_request(url) {
            return RequestOutcome::PassThrough;
        }
        let url = clean_url(url);

        match self.render_blocking(url).await {
            Ok(None) => RequestOutcome::PassThrough,
            Ok(Some(html)) => {
                let html = host.transform_html(url, html).await;
                RequestOutcome::Respond(DevResponse::html(200, html))
            }
            Err(err) => {
                warn!(url, error = %err, "twig render failed");
                host.notify(LiveUpdate::error(&err));
                RequestOutcome::Respond(DevResponse::html(500, render_error_page(&err)))
            }
        }
    }

    /// Host hook: a module changed
    ///
    /// Returns `true` when the file is a template or fixture; a full reload
    /// has then been sent and the host should skip its own hot update.
    pub fn handle_hot_update(&self, host: &dyn DevHost, file: &Path) -> bool {
        if !is_watched_file(file) {
            return false;
        }
        host.notify(LiveUpdate::FullReload);
        true
    }

    async fn render_blocking(&self, url: &str) -> Result<Option<String>> {
        let config = Arc::clone(&self.config);
        let environment = Arc::clone(&self.environment);
        let url = url.to_owned();

        tokio::task::spawn_blocking(move || render_url(&url, &config, &environment))
            .await
            .map_err(std::io::Error::from)?
    }
}

/// Render the template `url` points at, `None` when there is no such file
fn render_url(
    url: &str,
    config: &RendererConfig,
    environment: &TemplateEnvironment,
) -> Result<Option<String>> {
    let template_path = resolve_template_request(url, &config.views_root)?;
    if !template_path.is_file() {
        debug!(path = %template_path.display(), "no such template, passing through");
        return Ok(None);
    }

    render_template(RenderRequest {
        template_path: &template_path,
        config,
        environment,
        locals: None,
    })
    .map(Some)
}

/// Add a `<script type="module">` pointing at `src` to the page head
///
/// Hosts use this from [`DevHost::transform_html`] to load their
/// live-reload client.
pub fn inject_client_script(html: &str, src: &str) -> String {
    let document = Document::from(html);
    let tag = format!(
        r#"<script type="module" src="{}"></script>"#,
        escape_html(src)
    );
    document.select("head").append_html(tag);
    document.html().to_string()
}
