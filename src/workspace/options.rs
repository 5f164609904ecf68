//! Dotted-path access into nested option documents
//!
//! Options are free-form JSON objects. `set_path` deep-merges: it creates
//! intermediate objects as needed and never clobbers sibling keys that
//! already exist along the path.

use serde_json::{Map, Value};

/// Read the value at a dotted path, if present.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = root;
    for segment in path.split('.') {
        cursor = cursor.as_object()?.get(segment)?;
    }
    Some(cursor)
}

/// Write `value` at a dotted path, creating intermediate objects.
///
/// A non-object value sitting where an intermediate object is needed is
/// replaced by an object; sibling keys inside existing objects survive.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }

    let mut pending = Some(value);
    let mut segments = path.split('.').peekable();
    let mut cursor = root;
    while let Some(segment) = segments.next() {
        let Some(map) = cursor.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), pending.take().unwrap_or(Value::Null));
            return;
        }
        let next = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        cursor = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_path_preserves_sibling_keys() {
        let mut options = json!({ "a": { "b": { "d": 4 } } });
        set_path(&mut options, "a.b.c", json!(3));
        assert_eq!(options, json!({ "a": { "b": { "c": 3, "d": 4 } } }));
    }

    #[test]
    fn set_path_creates_missing_intermediates() {
        let mut options = json!({});
        set_path(&mut options, "theme.colors.primary", json!("teal"));
        assert_eq!(
            options,
            json!({ "theme": { "colors": { "primary": "teal" } } })
        );
    }

    #[test]
    fn set_path_replaces_scalar_intermediate() {
        let mut options = json!({ "a": 1 });
        set_path(&mut options, "a.b", json!(2));
        assert_eq!(options, json!({ "a": { "b": 2 } }));
    }

    #[test]
    fn set_path_top_level_key() {
        let mut options = json!({ "locale": "en-US" });
        set_path(&mut options, "currency", json!("EUR"));
        assert_eq!(options, json!({ "locale": "en-US", "currency": "EUR" }));
    }

    #[test]
    fn get_path_walks_nested_objects() {
        let options = json!({ "locale": "en-US", "a": { "b": { "c": 3 } } });
        assert_eq!(get_path(&options, "a.b.c"), Some(&json!(3)));
        assert_eq!(get_path(&options, "locale"), Some(&json!("en-US")));
        assert_eq!(get_path(&options, "a.missing"), None);
    }
}
