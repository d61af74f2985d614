//! Structural probes over captured portal payloads.
//!
//! The portal wraps the same row data in half a dozen envelopes
//! depending on screen, deployment, and backend version. The probes run
//! in a fixed order and the first structural hit wins, so adding a new
//! envelope can never reorder existing matches.

use serde_json::Value;

/// Envelope key some deployments wrap listings in.
pub const PRESENTATION_KEY: &str = "Apresentacao";

/// Extract the row list from a captured payload, or `None` when the
/// payload matches no known shape. An empty array is a valid match with
/// zero rows.
pub fn extract_list(raw: &Value) -> Option<Vec<Value>> {
    // 1. Bare array.
    if let Some(items) = raw.as_array() {
        return Some(items.clone());
    }
    // 2. Presentation envelope at the top level.
    if let Some(items) = raw.get(PRESENTATION_KEY).and_then(Value::as_array) {
        return Some(items.clone());
    }
    // 3. Presentation envelope nested under a data wrapper.
    for data_key in ["data", "Data"] {
        if let Some(items) = raw
            .get(data_key)
            .and_then(|d| d.get(PRESENTATION_KEY))
            .and_then(Value::as_array)
        {
            return Some(items.clone());
        }
    }
    // 4. Plain list containers.
    for key in ["data", "Data", "Notas", "items"] {
        if let Some(items) = raw.get(key).and_then(Value::as_array) {
            return Some(items.clone());
        }
    }
    // 5. Object keyed by row indices, "0".."n".
    numeric_keyed_rows(raw)
}

/// Rows stored as an object with numeric string keys, ordered by index.
/// Every key must parse as an integer or the probe rejects the object.
fn numeric_keyed_rows(raw: &Value) -> Option<Vec<Value>> {
    let obj = raw.as_object()?;
    if obj.is_empty() {
        return None;
    }
    let mut rows: Vec<(usize, Value)> = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        let index = key.parse::<usize>().ok()?;
        rows.push((index, value.clone()));
    }
    rows.sort_by_key(|(index, _)| *index);
    Some(rows.into_iter().map(|(_, v)| v).collect())
}

/// First non-null field among the given synonym names.
pub fn pick<'a>(item: &'a Value, names: &[&str]) -> Option<&'a Value> {
    for name in names {
        match item.get(*name) {
            Some(Value::Null) | None => continue,
            Some(value) => return Some(value),
        }
    }
    None
}
