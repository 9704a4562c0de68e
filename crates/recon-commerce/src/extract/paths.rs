//! Null-safe path lookups in loosely shaped JSON.
//!
//! Every fallback chain in the extractors is an ordered list of accessors
//! evaluated by [`first_some`]. Each accessor is a plain function so it can be
//! tested on its own.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

pub type Accessor<T> = fn(&Value) -> Option<T>;

/// Returns the first `Some` produced by `accessors`, in order.
pub fn first_some<T>(root: &Value, accessors: &[Accessor<T>]) -> Option<T> {
    accessors.iter().find_map(|accessor| accessor(root))
}

/// Walks a dotted path. Numeric segments index into arrays. `null` counts as
/// absent.
#[must_use]
pub fn at<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|v| !v.is_null())
}

/// Non-blank string at `path`. Numbers are rendered to their decimal form.
#[must_use]
pub fn str_at(root: &Value, path: &str) -> Option<String> {
    match at(root, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-blank string among `paths`.
#[must_use]
pub fn first_str(root: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| str_at(root, path))
}

/// Boolean at `path`; accepts `"true"`/`"false"` strings as well.
#[must_use]
pub fn bool_at(root: &Value, path: &str) -> Option<bool> {
    match at(root, path)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[must_use]
pub fn first_bool(root: &Value, paths: &[&str]) -> Option<bool> {
    paths.iter().find_map(|path| bool_at(root, path))
}

/// Array at `path`, if the node is an array.
#[must_use]
pub fn array_at<'v>(root: &'v Value, path: &str) -> Option<&'v Vec<Value>> {
    at(root, path).and_then(Value::as_array)
}

/// Timestamp at `path`: RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC), or
/// epoch milliseconds.
#[must_use]
pub fn timestamp_at(root: &Value, path: &str) -> Option<DateTime<Utc>> {
    match at(root, path)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

#[must_use]
pub fn first_timestamp(root: &Value, paths: &[&str]) -> Option<DateTime<Utc>> {
    paths.iter().find_map(|path| timestamp_at(root, path))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn never(_: &Value) -> Option<u32> {
        None
    }

    fn one(_: &Value) -> Option<u32> {
        Some(1)
    }

    fn two(_: &Value) -> Option<u32> {
        Some(2)
    }

    #[test]
    fn first_some_respects_order() {
        let root = json!({});
        assert_eq!(first_some(&root, &[never, two, one]), Some(2));
        assert_eq!(first_some::<u32>(&root, &[never]), None);
        assert_eq!(first_some::<u32>(&root, &[]), None);
    }

    #[test]
    fn at_walks_objects_and_arrays() {
        let root = json!({ "a": { "b": [ { "c": 5 } ] } });
        assert_eq!(at(&root, "a.b.0.c"), Some(&json!(5)));
        assert!(at(&root, "a.b.1.c").is_none());
        assert!(at(&root, "a.x.y").is_none());
        assert!(at(&json!("scalar"), "a").is_none());
    }

    #[test]
    fn null_is_absent() {
        let root = json!({ "a": null });
        assert!(at(&root, "a").is_none());
        assert!(str_at(&root, "a").is_none());
    }

    #[test]
    fn str_at_trims_and_renders_numbers() {
        let root = json!({ "s": "  x ", "blank": "   ", "n": 10_001 });
        assert_eq!(str_at(&root, "s").as_deref(), Some("x"));
        assert!(str_at(&root, "blank").is_none());
        assert_eq!(str_at(&root, "n").as_deref(), Some("10001"));
    }

    #[test]
    fn bool_at_accepts_strings() {
        let root = json!({ "a": true, "b": "False", "c": "maybe" });
        assert_eq!(bool_at(&root, "a"), Some(true));
        assert_eq!(bool_at(&root, "b"), Some(false));
        assert_eq!(bool_at(&root, "c"), None);
    }

    #[test]
    fn timestamps_in_several_shapes() {
        let root = json!({
            "rfc": "2025-03-01T10:00:00.000Z",
            "offset": "2025-03-01T12:00:00+02:00",
            "naive": "2025-03-01 10:00:00",
            "millis": 1_740_823_200_000_i64,
            "junk": "yesterday"
        });
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(timestamp_at(&root, "rfc"), Some(expected));
        assert_eq!(timestamp_at(&root, "offset"), Some(expected));
        assert_eq!(timestamp_at(&root, "naive"), Some(expected));
        assert_eq!(timestamp_at(&root, "millis"), Some(expected));
        assert_eq!(timestamp_at(&root, "junk"), None);
    }
}
