use serde_json::{Map, Value};

/// Collapse nested objects and arrays into a single-level map keyed by
/// dot-joined paths (`weather.0.main`). Empty objects, empty arrays and
/// nulls become `""` leaves; other scalars are kept verbatim.
pub fn flatten(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    let mut path = Vec::new();
    flatten_into(value, &mut path, &mut out);
    out
}

fn flatten_into(value: &Value, path: &mut Vec<String>, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                path.push(key.clone());
                flatten_into(child, path, out);
                path.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                path.push(idx.to_string());
                flatten_into(child, path, out);
                path.pop();
            }
        }
        Value::Object(_) | Value::Array(_) | Value::Null => {
            out.insert(path.join("."), Value::String(String::new()));
        }
        scalar => {
            out.insert(path.join("."), scalar.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_paths_are_dot_joined() {
        let input = json!({
            "dt": 1_700_000_000,
            "temp": {"day": 280.1, "night": 275.3},
            "weather": [{"id": 804, "main": "Clouds"}],
        });
        let flat = flatten(&input);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "dt",
                "temp.day",
                "temp.night",
                "weather.0.id",
                "weather.0.main"
            ]
        );
        assert_eq!(flat["weather.0.main"], json!("Clouds"));
    }

    #[test]
    fn empty_subtrees_become_empty_strings() {
        let flat = flatten(&json!({"a": {"b": {}}, "c": [], "d": null, "e": 0}));
        assert_eq!(flat["a.b"], json!(""));
        assert_eq!(flat["c"], json!(""));
        assert_eq!(flat["d"], json!(""));
        assert_eq!(flat["e"], json!(0));
    }

    #[test]
    fn flatten_is_deterministic() {
        let input = json!({"rain": {"1h": 0.4}, "weather": [{"icon": "10d"}, {"icon": "04n"}]});
        assert_eq!(flatten(&input), flatten(&input));
    }
}
