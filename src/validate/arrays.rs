//! Array gap detection.

use serde_json::{Map, Value};

use crate::mapper::is_empty_value;

/// An empty array element followed by a non-empty one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayGap {
    /// Top-level property holding the array
    pub property: String,
    /// Path of the empty element, e.g. `steps#0` or `protocol.items#1`
    pub path: String,
}

/// Find array elements that are empty but followed by a non-empty element
///
/// Trailing empty elements are pruned while mapping, so any empty element
/// left in an array is a gap.
#[must_use]
pub fn find_gaps(object: &Map<String, Value>) -> Vec<ArrayGap> {
    let mut gaps = Vec::new();
    for (property, value) in object {
        walk(property, property, value, &mut gaps);
    }
    gaps
}

fn walk(property: &str, path: &str, value: &Value, gaps: &mut Vec<ArrayGap>) {
    match value {
        Value::Array(items) => {
            let last_non_empty = items.iter().rposition(|item| !is_empty_value(item));
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}#{index}");
                if is_empty_value(item) && last_non_empty.is_some_and(|last| last > index) {
                    gaps.push(ArrayGap {
                        property: property.to_string(),
                        path: item_path,
                    });
                } else {
                    walk(property, &item_path, item, gaps);
                }
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk(property, &format!("{path}.{key}"), child, gaps);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gaps(value: Value) -> Vec<String> {
        let Value::Object(map) = value else {
            return Vec::new();
        };
        find_gaps(&map).into_iter().map(|gap| gap.path).collect()
    }

    #[test]
    fn test_gap_before_non_empty() {
        assert_eq!(gaps(json!({"steps": [{}, {"name": "b"}]})), vec!["steps#0"]);
        assert_eq!(gaps(json!({"p": {"items": [{"a": 1}, {}, {"a": 2}]}})), vec!["p.items#1"]);
    }

    #[test]
    fn test_trailing_empties_are_not_gaps() {
        assert!(gaps(json!({"steps": [{"name": "a"}, {}]})).is_empty());
        assert!(gaps(json!({"tags": ["a", "b"]})).is_empty());
    }
}
