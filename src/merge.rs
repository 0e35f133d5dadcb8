//! Deep merge of data layers
//!
//! The render context is assembled from global data, fixture data and
//! per-call locals, in that order. Mappings merge recursively, everything
//! else (scalars, `null`, sequences) replaces what was there before.

use serde_json::{Map, Value as JsonValue};

/// Merge `source` into `target` in place and return `target`
///
/// For each key of `source`:
///
/// - a sequence replaces the target value wholesale (mapping elements are
///   deep-copied, never merged element-wise with an existing sequence)
/// - a mapping recurses into the target mapping, resetting the target to an
///   empty mapping first when it is missing, a scalar or a sequence
/// - any other value overwrites the target value
///
/// Keys missing from `source` are left untouched.
pub fn merge<'a>(
    target: &'a mut Map<String, JsonValue>,
    source: &Map<String, JsonValue>,
) -> &'a mut Map<String, JsonValue> {
    for (key, value) in source {
        match value {
            JsonValue::Array(items) => {
                target.insert(key.clone(), JsonValue::Array(copy_items(items)));
            }
            JsonValue::Object(nested) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| JsonValue::Object(Map::new()));
                if !slot.is_object() {
                    *slot = JsonValue::Object(Map::new());
                }
                if let JsonValue::Object(existing) = slot {
                    merge(existing, nested);
                }
            }
            scalar => {
                target.insert(key.clone(), scalar.clone());
            }
        }
    }
    target
}

/// Pure form of [`merge`]: returns a new mapping, leaving both inputs as they were
pub fn merged(
    base: &Map<String, JsonValue>,
    source: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut result = Map::new();
    merge(&mut result, base);
    merge(&mut result, source);
    result
}

/// Merge `layers` in order into a fresh mapping; later layers win
///
/// Each step goes through [`merged`], so no layer is ever aliased into the
/// result.
pub fn merge_layers(layers: &[&Map<String, JsonValue>]) -> Map<String, JsonValue> {
    layers
        .iter()
        .fold(Map::new(), |acc, layer| merged(&acc, layer))
}

fn copy_items(items: &[JsonValue]) -> Vec<JsonValue> {
    items
        .iter()
        .map(|item| match item {
            JsonValue::Object(map) => {
                let mut copy = Map::new();
                merge(&mut copy, map);
                JsonValue::Object(copy)
            }
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_locals_win_ties() {
        let global = map(json!({"a": 1}));
        let fixture = map(json!({"a": 2}));
        let locals = map(json!({"a": 3}));

        let context = merge_layers(&[&global, &fixture, &locals]);
        assert_eq!(context["a"], json!(3));
    }

    #[test]
    fn test_mappings_merge_deeply() {
        let global = map(json!({"obj": {"x": 1, "deep": {"keep": true}}}));
        let fixture = map(json!({"obj": {"y": 2, "deep": {"add": "yes"}}}));

        let context = merge_layers(&[&global, &fixture]);
        assert_eq!(
            JsonValue::Object(context),
            json!({"obj": {"x": 1, "deep": {"keep": true, "add": "yes"}, "y": 2}})
        );
    }

    #[test]
    fn test_sequences_replace_wholesale() {
        let global = map(json!({"arr": [1, 2]}));
        let fixture = map(json!({"arr": [3]}));

        let context = merge_layers(&[&global, &fixture]);
        assert_eq!(JsonValue::Object(context), json!({"arr": [3]}));
    }

    #[test]
    fn test_mapping_replaces_scalar_and_sequence() {
        let mut target = map(json!({"a": "text", "b": [1, 2], "c": null}));
        let source = map(json!({"a": {"x": 1}, "b": {"y": 2}, "c": {"z": 3}}));

        merge(&mut target, &source);
        assert_eq!(
            JsonValue::Object(target),
            json!({"a": {"x": 1}, "b": {"y": 2}, "c": {"z": 3}})
        );
    }

    #[test]
    fn test_scalars_and_null_overwrite() {
        let mut target = map(json!({"obj": {"x": 1}, "flag": true}));
        let source = map(json!({"obj": null, "flag": false}));

        merge(&mut target, &source);
        assert_eq!(JsonValue::Object(target), json!({"obj": null, "flag": false}));
    }

    #[test]
    fn test_merging_empty_mapping_is_identity() {
        let original = map(json!({"a": 1, "nested": {"list": [{"k": "v"}], "n": null}}));
        let mut target = original.clone();

        merge(&mut target, &Map::new());
        assert_eq!(target, original);
    }

    #[test]
    fn test_sequence_elements_are_copies() {
        let source = map(json!({"items": [{"name": "first"}, 2, "three"]}));
        let mut target = Map::new();
        merge(&mut target, &source);

        if let Some(JsonValue::Array(items)) = target.get_mut("items") {
            items[0]["name"] = json!("changed");
        }
        assert_eq!(source["items"][0]["name"], json!("first"));
        assert_eq!(target["items"], json!([{"name": "changed"}, 2, "three"]));
    }

    #[test]
    fn test_merged_does_not_mutate_inputs() {
        let base = map(json!({"opts": {"default": {"mail": "global@example.com"}}}));
        let source = map(json!({"opts": {"default": {"mail": "local@example.com"}}}));

        let result = merged(&base, &source);
        assert_eq!(result["opts"]["default"]["mail"], json!("local@example.com"));
        assert_eq!(base["opts"]["default"]["mail"], json!("global@example.com"));
    }

    #[test]
    fn test_layers_leave_inputs_untouched() {
        let global = map(json!({"opts": {"default": {"mail": "global@example.com"}}, "list": [1]}));
        let locals = map(json!({"opts": {"default": {"mail": "local@example.com"}}, "list": [2]}));

        let context = merge_layers(&[&global, &locals]);
        assert_eq!(context, merged(&global, &locals));
        assert_eq!(global["opts"]["default"]["mail"], json!("global@example.com"));
        assert_eq!(global["list"], json!([1]));
    }

    #[test]
    fn test_key_order_follows_first_insertion() {
        let global = map(json!({"b": 1, "a": 1}));
        let fixture = map(json!({"c": 1, "a": 2}));

        let context = merge_layers(&[&global, &fixture]);
        let keys: Vec<&str> = context.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
