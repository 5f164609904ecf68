//! Localized value resolution
//!
//! Records carry localized text as maps of locale tag to string
//! (`{"en-US": "...", "fa-IR": "..."}`). `translate` resolves such maps to
//! plain strings for the active locale, walking records, lists, and
//! arbitrarily nested documents. Pure; everything else passes through
//! untouched.

use serde_json::Value;

/// True for keys shaped like BCP 47-ish locale tags (`en`, `en-US`).
fn looks_like_locale(key: &str) -> bool {
    let mut parts = key.split('-');
    let language = match parts.next() {
        Some(p) => p,
        None => return false,
    };
    if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_lowercase()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(region) => {
            region.len() == 2
                && region.chars().all(|c| c.is_ascii_uppercase())
                && parts.next().is_none()
        }
    }
}

/// A localized map: a non-empty object whose every key is a locale tag
/// and every value a string.
fn is_localized_map(value: &Value) -> bool {
    match value.as_object() {
        Some(map) if !map.is_empty() => map
            .iter()
            .all(|(key, value)| looks_like_locale(key) && value.is_string()),
        _ => false,
    }
}

/// Resolve every localized map inside `value` to the `locale` string,
/// falling back to the first entry when the locale is absent.
pub fn translate(value: &Value, locale: &str) -> Value {
    match value {
        Value::Object(map) => {
            if is_localized_map(value) {
                return map
                    .get(locale)
                    .or_else(|| map.values().next())
                    .cloned()
                    .unwrap_or(Value::Null);
            }
            Value::Object(
                map.iter()
                    .map(|(key, nested)| (key.clone(), translate(nested, locale)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| translate(item, locale)).collect())
        }
        other => other.clone(),
    }
}
