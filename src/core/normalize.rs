use serde_json::Value;

/// Single-key wrappers that stand in for a numeric value in extended JSON exports.
pub const BOXED_NUMBER_KEYS: [&str; 4] = ["$numberDecimal", "$numberDouble", "$numberLong", "$numberInt"];

/// Rewrites every boxed number in the tree to its string form, at any depth.
/// Everything else is returned unchanged.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(unboxed) = unbox(&map) {
                return unboxed;
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

pub fn normalize_all(values: Vec<Value>) -> Vec<Value> {
    values.into_iter().map(normalize).collect()
}

fn unbox(map: &serde_json::Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    if !BOXED_NUMBER_KEYS.contains(&key.as_str()) {
        return None;
    }
    match inner {
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Number(n) => Some(Value::String(n.to_string())),
        // Not a scalar, so not a boxed number after all.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_top_level_decimal() {
        let input = json!({"price": {"$numberDecimal": "199.99"}, "title": "X"});
        assert_eq!(normalize(input), json!({"price": "199.99", "title": "X"}));
    }

    #[test]
    fn unwraps_nested_occurrences_independently() {
        let input = json!({
            "variants": [
                {"price": {"$numberDecimal": "10.50"}},
                {"price": {"$numberDecimal": "12"}, "tags": ["a", {"$numberLong": "9007199254740993"}]}
            ],
            "meta": {"rating": {"avg": {"$numberDouble": 4.5}}}
        });

        let expected = json!({
            "variants": [
                {"price": "10.50"},
                {"price": "12", "tags": ["a", "9007199254740993"]}
            ],
            "meta": {"rating": {"avg": "4.5"}}
        });

        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn leaves_lookalikes_alone() {
        let two_keys = json!({"$numberDecimal": "1", "currency": "USD"});
        assert_eq!(normalize(two_keys.clone()), two_keys);

        let other_key = json!({"amount": "1"});
        assert_eq!(normalize(other_key.clone()), other_key);

        let object_inner = json!({"$numberDecimal": {"value": "1"}});
        assert_eq!(normalize(object_inner.clone()), object_inner);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(normalize(json!(null)), json!(null));
        assert_eq!(normalize(json!(42)), json!(42));
        assert_eq!(normalize(json!("199.99")), json!("199.99"));
        assert_eq!(normalize(json!([1, true])), json!([1, true]));
    }
}
