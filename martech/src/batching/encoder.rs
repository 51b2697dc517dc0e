use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::error::MartechResult;
use crate::types::{Record, value_to_cell};

/// Encodes a slice of records into the payload sent to a destination.
///
/// The batcher sizes batches with [`BatchEncoder::encoded_len`], which must grow monotonically
/// with the number of records encoded.
pub trait BatchEncoder: Send + Sync {
    fn encode(&self, records: &[Record]) -> MartechResult<Vec<u8>>;

    fn encoded_len(&self, records: &[Record]) -> MartechResult<usize> {
        Ok(self.encode(records)?.len())
    }

    fn content_type(&self) -> &'static str;
}

/// Encodes records as a compact JSON array, optionally wrapped in an object under one key.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArrayEncoder {
    wrapper_key: Option<&'static str>,
}

impl JsonArrayEncoder {
    /// Encodes `[r1, r2, ..]`.
    pub const fn bare() -> Self {
        Self { wrapper_key: None }
    }

    /// Encodes `{"<key>": [r1, r2, ..]}`.
    pub const fn wrapped(key: &'static str) -> Self {
        Self {
            wrapper_key: Some(key),
        }
    }
}

impl BatchEncoder for JsonArrayEncoder {
    fn encode(&self, records: &[Record]) -> MartechResult<Vec<u8>> {
        let encoded = match self.wrapper_key {
            Some(key) => {
                let mut wrapper = Map::with_capacity(1);
                wrapper.insert(key.to_owned(), Value::Array(records_to_values(records)));
                serde_json::to_vec(&wrapper)?
            }
            None => serde_json::to_vec(records)?,
        };

        Ok(encoded)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// Encodes `{"<key>": [v1, v2, ..]}` where each value is taken from `field` of a record.
///
/// Records without the field are skipped.
#[derive(Debug, Clone, Copy)]
pub struct FieldListEncoder {
    key: &'static str,
    field: &'static str,
}

impl FieldListEncoder {
    pub const fn new(key: &'static str, field: &'static str) -> Self {
        Self { key, field }
    }

    /// Collects the listed values of `records`.
    pub fn values(&self, records: &[Record]) -> Vec<Value> {
        records
            .iter()
            .filter_map(|record| record.get(self.field).cloned())
            .collect()
    }
}

impl BatchEncoder for FieldListEncoder {
    fn encode(&self, records: &[Record]) -> MartechResult<Vec<u8>> {
        let mut wrapper = Map::with_capacity(1);
        wrapper.insert(self.key.to_owned(), Value::Array(self.values(records)));

        Ok(serde_json::to_vec(&wrapper)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// Encodes records as CSV with a header row.
///
/// The header is the union of all record keys in first-seen order; missing fields and nulls
/// are empty cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvEncoder;

impl CsvEncoder {
    pub const fn new() -> Self {
        Self
    }
}

impl BatchEncoder for CsvEncoder {
    fn encode(&self, records: &[Record]) -> MartechResult<Vec<u8>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut columns = IndexSet::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key.as_str()) {
                    columns.insert(key.clone());
                }
            }
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns.iter())?;
        for record in records {
            writer.write_record(
                columns
                    .iter()
                    .map(|column| record.get(column).map(value_to_cell).unwrap_or_default()),
            )?;
        }

        writer.into_inner().map_err(|err| err.into_error().into())
    }

    fn content_type(&self) -> &'static str {
        "text/csv"
    }
}

fn records_to_values(records: &[Record]) -> Vec<Value> {
    records
        .iter()
        .map(|record| Value::Object(record.clone()))
        .collect()
}
