use serde_json::{Map, Value};

/// A single source row: field name to scalar value, in source column order.
pub type Record = Map<String, Value>;

/// A record that passed the transformation pipeline, with its resolved identity.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRecord {
    /// Value of the first usable identity field.
    pub identity: Value,
    /// The transformed fields.
    pub data: Record,
}

/// Returns whether `value` counts as present for identity and conditional coercions.
///
/// Null, `false`, zero, empty strings and empty containers are absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Renders a scalar the way it appears in a CSV cell; null is an empty cell.
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
