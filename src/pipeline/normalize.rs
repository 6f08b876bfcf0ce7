//! Result normalization.
//!
//! The strict output schema forces the model to answer every key, so
//! "absent" arrives as explicit `null`. Normalization prunes those nulls
//! recursively, mirrors the nested `projectInfo` fields back out to the
//! historical flat keys, and serializes the final object to a `raw`
//! string so audit records always carry a text representation.

use serde_json::{Map, Value};

/// Normalized analysis plus its text serialization.
#[derive(Debug, Clone)]
pub struct NormalizedAnalysis {
    pub result: Value,
    pub raw: String,
}

/// Recursively prune `null` values. Arrays drop null entries after
/// recursion; objects drop keys whose normalized value vanishes. Empty
/// objects and arrays are kept — only `null` disappears.
pub fn prune_nulls(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(prune_nulls).collect(),
        )),
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune_nulls(v).map(|v| (k, v)))
                .collect();
            Some(Value::Object(pruned))
        }
        other => Some(other),
    }
}

/// Mirror every `projectInfo` field to the top level when the flat key is
/// absent, for backward compatibility with callers and persisted
/// documents that predate the nested shape.
pub fn mirror_project_info(result: &mut Value) {
    let info = match result.get("projectInfo").and_then(Value::as_object) {
        Some(info) => info.clone(),
        None => return,
    };

    if let Some(top) = result.as_object_mut() {
        for (key, value) in info {
            top.entry(key).or_insert(value);
        }
    }
}

/// Produce the externally visible result shape.
pub fn normalize(value: Value) -> NormalizedAnalysis {
    let mut result = match prune_nulls(value) {
        Some(Value::Object(map)) => Value::Object(map),
        // Scalars/arrays never come out of the schema; collapse anything
        // unexpected to an empty object rather than surface a bad shape.
        _ => Value::Object(Map::new()),
    };

    mirror_project_info(&mut result);

    let raw = serde_json::to_string(&result).unwrap_or_default();

    NormalizedAnalysis { result, raw }
}
