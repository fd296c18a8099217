use serde_json::{Map, Value};

/// Compact JSON text with object keys sorted at every level.
///
/// Used wherever a hash or an equality check must not depend on key order:
/// the registry hash, structured field values and journal lines.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

/// Copy of `v` with object keys sorted recursively. Array order is kept.
fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_sorted_arrays_kept() {
        let v = json!({"b": {"z": 1, "a": [3, {"y": 0, "x": 1}]}, "a": null});
        assert_eq!(
            canonical_json(&v),
            r#"{"a":null,"b":{"a":[3,{"x":1,"y":0}],"z":1}}"#
        );
    }
}
