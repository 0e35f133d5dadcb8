//! Mock data fixtures
//!
//! A template `<views>/pages/about.twig` takes its mock data from
//! `<mock>/pages/about.json`. Fixtures are read from disk on every render.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::{relative_to, swap_suffix, FIXTURE_SUFFIX};

/// Location of the fixture that belongs to `template_path`
pub fn fixture_path_for(template_path: &Path, views_root: &Path, mock_root: &Path) -> PathBuf {
    let relative = relative_to(views_root, template_path);
    mock_root.join(swap_suffix(&relative, FIXTURE_SUFFIX))
}

/// Load the mock data mapping for `template_path`
///
/// # Errors
///
/// - [`Error::MissingFixture`] when the file is absent and `allow_missing` is false
/// - [`Error::InvalidFixtureJson`] when the file is not a JSON object
/// - [`Error::Io`] for any other read failure
pub fn load_mock_data(
    template_path: &Path,
    views_root: &Path,
    mock_root: &Path,
    allow_missing: bool,
) -> Result<Map<String, JsonValue>> {
    let fixture = fixture_path_for(template_path, views_root, mock_root);

    let raw = match std::fs::read_to_string(&fixture) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            if allow_missing {
                debug!(fixture = %fixture.display(), "no mock data, using empty layer");
                return Ok(Map::new());
            }
            let template = relative_to(views_root, template_path);
            return Err(Error::MissingFixture {
                template: template.to_string_lossy().into_owned(),
                fixture,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let parsed: JsonValue =
        serde_json::from_str(&raw).map_err(|err| Error::invalid_fixture(fixture.clone(), &err))?;

    match parsed {
        JsonValue::Object(map) => {
            debug!(fixture = %fixture.display(), keys = map.len(), "loaded mock data");
            Ok(map)
        }
        other => Err(Error::InvalidFixtureJson {
            fixture,
            detail: format!("expected a JSON object, found {}", json_type_name(&other)).into(),
        }),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
