//! Field-level differences between two JSON documents.
//!
//! Used to build the `changes` payload of a version record from a quotation
//! before and after an edit. Each changed field is keyed by its dotted path:
//!
//! ```json
//! { "customer.name": { "old": "Acme", "new": "Acme Ltd" } }
//! ```

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Field name used when the documents themselves are not objects.
pub const ROOT_FIELD: &str = "$";

/// Compute the changed fields between `before` and `after`.
///
/// - Keys of both objects are walked in sorted order.
/// - Nested objects recurse, joining keys with `.`.
/// - Arrays are compared as a whole.
/// - A value whose JSON type changed is reported at that path, without recursing.
/// - A key present on one side only is reported with `null` on the other,
///   including a key whose only value is an explicit `null`.
pub fn changes(before: &Value, after: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => compare_objects(a, b, "", &mut out),
        (a, b) if a != b => {
            out.insert(ROOT_FIELD.to_string(), change(a, b));
        }
        _ => {}
    }
    out
}

fn compare_objects(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    prefix: &str,
    out: &mut Map<String, Value>,
) {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    for key in keys {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match (before.get(key), after.get(key)) {
            (Some(Value::Object(a)), Some(Value::Object(b))) => {
                compare_objects(a, b, &path, out)
            }
            (Some(a), Some(b)) if a == b => {}
            // Added or removed keys count even when the present side is null
            (old, new) => {
                out.insert(
                    path,
                    change(old.unwrap_or(&Value::Null), new.unwrap_or(&Value::Null)),
                );
            }
        }
    }
}

fn change(old: &Value, new: &Value) -> Value {
    json!({ "old": old, "new": new })
}
