use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value as JsonValue};
use twig_ssr::test_utils::{
    copy_dir, extract_attrs_by_selector, extract_text_by_selector, fixture_project, write_file,
};
use twig_ssr::{Error, RendererOptions, TwigRenderer, TwigRendererBuilder};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn builder_for(root: PathBuf) -> TwigRendererBuilder {
    TwigRendererBuilder::new()
        .with_root(root)
        .with_views_path("views")
        .with_mock_path("mock")
        .with_global_data(json!({
            "site_name": "Demo Site",
            "opts": {
                "default": {
                    "contact_mail": "global@example.com"
                }
            }
        }))
        .add_filter("uppercase", |args| {
            let value = args.first().and_then(JsonValue::as_str).unwrap_or_default();
            Ok(value.to_uppercase().into())
        })
        .add_function("asset", |args| {
            let file = args.first().and_then(JsonValue::as_str).unwrap_or_default();
            Ok(format!("/static/{file}").into())
        })
}

fn renderer() -> TwigRenderer {
    init_tracing();
    builder_for(fixture_project()).build().unwrap()
}

/// A writable copy of the sample project
fn scratch_project() -> (tempfile::TempDir, PathBuf) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("project");
    copy_dir(&fixture_project(), &root).unwrap();
    (dir, root)
}

fn locals(value: JsonValue) -> Map<String, JsonValue> {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_renders_with_fixture_globals_filters_and_functions() {
    let html = renderer().render("about.twig", None).unwrap();

    assert!(html.contains("About Twig"));
    assert!(html.contains(r#"<div class="content"><p>Rendered via Twig.js</p></div>"#));
    assert!(html.contains("2. About"));
    assert!(html.contains("VITE TWIG"));
    assert!(html.contains(r#"href="/static/logo.svg""#));
    assert!(html.contains("support@example.com"));
    assert!(html.contains(r#"data-template="about.twig""#));

    assert_eq!(extract_text_by_selector(&html, "header a.brand"), vec!["Demo Site"]);
    assert_eq!(
        extract_text_by_selector(&html, "ol.breadcrumbs li"),
        vec!["1. Home", "2. About"]
    );
    assert_eq!(
        extract_attrs_by_selector(&html, "a.contact", "href"),
        vec!["mailto:support@example.com"]
    );
}

#[test]
fn test_missing_fixture_uses_globals_and_locals() {
    let html = renderer()
        .render("minimal.twig", Some(&locals(json!({"fromTest": "OK"}))))
        .unwrap();

    assert_eq!(extract_text_by_selector(&html, "p.from-test"), vec!["OK"]);
    assert_eq!(
        extract_text_by_selector(&html, "p.contact"),
        vec!["global@example.com"]
    );
    assert_eq!(extract_text_by_selector(&html, "p.output"), vec!["minimal.html"]);
}

#[test]
fn test_invalid_fixture_json_is_reported() {
    let (_dir, root) = scratch_project();
    write_file(
        &root,
        "mock/needs-data.json",
        "{\n  \"current\": {\n    \"title\": \"Broken\"\n  },\n}\n",
    )
    .unwrap();

    let err = builder_for(root.clone())
        .build()
        .unwrap()
        .render("needs-data.twig", None)
        .unwrap_err();

    assert!(matches!(err, Error::InvalidFixtureJson { .. }));
    let message = err.to_string();
    assert!(message.contains("Invalid JSON"));
    assert!(message.contains("needs-data.json"));
}

#[test]
fn test_strict_mode_requires_fixture() {
    init_tracing();
    let strict = TwigRendererBuilder::new()
        .with_root(fixture_project())
        .with_views_path("views")
        .with_mock_path("mock")
        .with_allow_missing_mock(false)
        .build()
        .unwrap();

    let err = strict.render("missing.twig", None).unwrap_err();
    assert!(matches!(err, Error::MissingFixture { .. }));
    let message = err.to_string();
    assert!(message.contains("Missing mock data"));
    assert!(message.contains("missing.twig"));
    assert!(message.contains("missing.json"));

    let html = strict.render("needs-data.twig", None).unwrap();
    assert!(html.contains("Needs Data"));
}

#[test]
fn test_rendering_is_repeatable() {
    let renderer = renderer();
    let first = renderer.render("about.twig", None).unwrap();
    let second = renderer.render("about.twig", None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_edits_are_picked_up_without_restart() {
    let (_dir, root) = scratch_project();
    let renderer = builder_for(root.clone()).build().unwrap();

    let before = renderer.render("about.twig", None).unwrap();
    assert!(before.contains("About Twig"));

    write_file(
        &root,
        "views/partials/header.twig",
        r#"<header><a class="brand" href="/">Edited {{ site_name }}</a></header>"#,
    )
    .unwrap();
    write_file(&root, "mock/about.json", r#"{"current": {"title": "Edited title"}}"#).unwrap();

    let after = renderer.render("about.twig", None).unwrap();
    assert_eq!(
        extract_text_by_selector(&after, "header a.brand"),
        vec!["Edited Demo Site"]
    );
    assert!(after.contains("Edited title"));
    assert!(!after.contains("About Twig"));
}

#[test]
fn test_templates_outside_views_root_are_refused() {
    let renderer = renderer();

    let err = renderer.render("../mock/about.json", None).unwrap_err();
    assert!(matches!(err, Error::OutsideSandbox { .. }));
    assert!(err.to_string().contains("views root"));

    let err = renderer
        .render(fixture_project().join("components/button.twig"), None)
        .unwrap_err();
    assert!(matches!(err, Error::OutsideSandbox { .. }));
}

#[test]
fn test_missing_template_is_fatal_for_standalone_renderer() {
    let err = renderer().render("nope.twig", None).unwrap_err();
    assert!(matches!(err, Error::TemplateNotFound { .. }));
    assert!(err.is_not_found());
}

#[test]
fn test_namespaced_includes() {
    init_tracing();
    let renderer = builder_for(fixture_project())
        .with_namespace("components", "components")
        .build()
        .unwrap();

    let html = renderer.render("namespaced.twig", None).unwrap();
    assert_eq!(extract_text_by_selector(&html, "button.btn"), vec!["Save", "Save"]);
}

#[test]
fn test_engine_errors_are_surfaced() {
    let (_dir, root) = scratch_project();
    write_file(&root, "views/broken.twig", "{% if %}never closed").unwrap();

    let err = builder_for(root)
        .build()
        .unwrap()
        .render("broken.twig", None)
        .unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert!(!err.stack().is_empty());
}

#[test]
fn test_render_context_contract() {
    let renderer = renderer();
    let context = renderer
        .render_context(
            "about.twig",
            Some(&locals(json!({"_file": "spoofed", "page": {"extra": true}}))),
        )
        .unwrap();

    let views_root = fixture_project().join("views");
    assert_eq!(
        context["_file"],
        json!({
            "path": views_root.join("about.twig").to_string_lossy(),
            "relative": "about.twig"
        })
    );
    assert_eq!(
        context["_target"],
        json!({
            "path": fixture_project().join("about.html").to_string_lossy(),
            "relative": "about.html"
        })
    );
    assert_eq!(context["page"]["tagline"], json!("vite twig"));
    assert_eq!(context["page"]["extra"], json!(true));
    assert_eq!(context["site_name"], json!("Demo Site"));
    assert!(context["feVersion"].as_str().is_some_and(|v| !v.is_empty()));
}

#[test]
fn test_options_from_json_file() {
    let (_dir, root) = scratch_project();
    let config_path = write_file(
        &root,
        "twig-ssr.json",
        r#"{
            "viewsPath": "views",
            "mockPath": "mock",
            "globalData": {"site_name": "From File"},
            "allowMissingMock": true
        }"#,
    )
    .unwrap();

    let options = RendererOptions::from_json_file(&config_path).unwrap();
    let renderer = TwigRendererBuilder::new()
        .with_options(options)
        .with_root(root)
        .build()
        .unwrap();

    let html = renderer.render("missing.twig", None).unwrap();
    assert!(html.contains("From File"));
}
