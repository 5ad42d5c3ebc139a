//! Extraction of tagged values from nested JSON.
//!
//! The models endpoint wraps identifiers in `{"@object": ...}` at arbitrary
//! depth. The walk is depth-first and bounded since the nesting comes from
//! the server.

use serde_json::Value;
use tracing::warn;

pub const OBJECT_TAG: &str = "@object";
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Collects every value stored under `tag`, in depth-first order. Tagged
/// values are searched as well, so nested tags are all reported.
pub fn collect_tagged<'a>(root: &'a Value, tag: &str, max_depth: usize) -> Vec<&'a Value> {
    let mut found = Vec::new();
    let mut truncated = false;
    walk(root, tag, 0, max_depth, &mut found, &mut truncated);
    if truncated {
        warn!(tag, max_depth, "tagged value search hit the depth limit");
    }
    found
}

fn walk<'a>(value: &'a Value, tag: &str, depth: usize, max_depth: usize, found: &mut Vec<&'a Value>, truncated: &mut bool) {
    if depth > max_depth {
        *truncated = true;
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == tag {
                    found.push(child);
                }
                walk(child, tag, depth + 1, max_depth, found, truncated);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, tag, depth + 1, max_depth, found, truncated);
            }
        }
        _ => (),
    }
}

/// The model identifiers found under `@object`: strings as they are, and the
/// `progID`/`name` member of tagged objects. Deduplicated, first seen first.
pub fn model_names(root: &Value) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for value in collect_tagged(root, OBJECT_TAG, DEFAULT_MAX_DEPTH) {
        let name = match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("progID")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        };
        if let Some(name) = name {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
