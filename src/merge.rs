//! Deep merge of untrusted JSON onto a base document.
//!
//! This is the only sanitization step between an imported file and the
//! form. Keys that would reach an object's prototype machinery once the
//! document is handed to a script-based consumer (`__proto__`,
//! `constructor`, `prototype`) are never written, and any object or array
//! that contains one of them at any depth is dropped as a whole.

use serde_json::{Map, Value};
use tracing::debug;

pub const UNSAFE_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

pub fn is_unsafe_key(key: &str) -> bool {
    UNSAFE_KEYS.contains(&key)
}

/// True when `value` carries an unsafe key anywhere below it.
///
/// `serde_json::Value` is an owned tree, so no cycle guard is needed.
pub fn contains_unsafe_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, child)| is_unsafe_key(key) || contains_unsafe_key(child)),
        Value::Array(items) => items.iter().any(contains_unsafe_key),
        _ => false,
    }
}

/// Merges `source` into `target` and returns `target`.
///
/// Objects recurse (an empty object is created when the target has none at
/// that key), arrays replace wholesale, scalars overwrite. A source that is
/// not an object leaves `target` untouched.
pub fn deep_merge<'a>(target: &'a mut Value, source: &Value) -> &'a mut Value {
    let Value::Object(source) = source else {
        return target;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = &mut *target {
        merge_maps(map, source);
    }
    target
}

fn merge_maps(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if is_unsafe_key(key) {
            debug!(key = %key, "skipping unsafe key during merge");
            continue;
        }
        if contains_unsafe_key(value) {
            debug!(key = %key, "skipping subtree carrying an unsafe key");
            continue;
        }
        match value {
            Value::Object(child) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(slot) = slot {
                    merge_maps(slot, child);
                }
            }
            Value::Array(items) => {
                target.insert(key.clone(), Value::Array(items.clone()));
            }
            scalar => {
                target.insert(key.clone(), scalar.clone());
            }
        }
    }
}
