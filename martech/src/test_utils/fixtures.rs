use serde_json::Value;

use crate::connection::Connection;
use crate::types::Record;

/// Converts JSON objects into records, skipping anything else.
pub fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect()
}

/// Parses a secrets bundle entry into a connection.
///
/// Panics when the entry is not a valid connection.
pub fn connection(id: &str, entry: Value) -> Connection {
    match Connection::from_bundle_entry(id, entry) {
        Ok(connection) => connection,
        Err(err) => panic!("invalid connection fixture {id}: {err}"),
    }
}
