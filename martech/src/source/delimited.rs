use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use csv::{Reader, ReaderBuilder, StringRecord};
use serde_json::{Number, Value};
use tracing::{info, warn};

use crate::error::MartechResult;
use crate::source::RecordSource;
use crate::storage::{ObjectLocation, ObjectStore};
use crate::types::Record;

/// Cell texts read as missing values.
const NULL_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Source reading a CSV file with a header row from the object store.
///
/// Cells are typed on read: missing markers become null, integer and float literals become
/// numbers, `true`/`false` in any common casing become booleans, and everything else stays
/// text. A missing file yields no records.
pub struct ObjectStoreCsvSource {
    location: ObjectLocation,
    reader: Option<Reader<Cursor<Bytes>>>,
    headers: StringRecord,
    chunk_size: usize,
    rows_read: usize,
}

impl ObjectStoreCsvSource {
    /// Fetches the file at `location` and prepares reading it in chunks of `chunk_size`.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        location: ObjectLocation,
        chunk_size: usize,
    ) -> MartechResult<Self> {
        let Some(data) = store.get(&location.bucket, &location.key).await? else {
            warn!(location = %location, "no file found in the object store, nothing to read");
            return Ok(Self {
                location,
                reader: None,
                headers: StringRecord::new(),
                chunk_size: chunk_size.max(1),
                rows_read: 0,
            });
        };

        info!(location = %location, bytes = data.len(), "reading csv source");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(Cursor::new(data));
        let headers = reader.headers()?.clone();

        Ok(Self {
            location,
            reader: Some(reader),
            headers,
            chunk_size: chunk_size.max(1),
            rows_read: 0,
        })
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    /// Number of data rows handed out so far, the header excluded.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

#[async_trait]
impl RecordSource for ObjectStoreCsvSource {
    async fn next_chunk(&mut self) -> MartechResult<Option<Vec<Record>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut row = StringRecord::new();
        while chunk.len() < self.chunk_size && reader.read_record(&mut row)? {
            chunk.push(row_to_record(&self.headers, &row));
        }

        if chunk.is_empty() {
            info!(location = %self.location, rows = self.rows_read, "finished reading csv source");
            self.reader = None;
            return Ok(None);
        }

        self.rows_read += chunk.len();
        Ok(Some(chunk))
    }
}

fn row_to_record(headers: &StringRecord, row: &StringRecord) -> Record {
    let mut record = Record::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let value = row.get(index).map(infer_cell).unwrap_or(Value::Null);
        record.insert(header.to_owned(), value);
    }
    record
}

/// Types a CSV cell.
pub fn infer_cell(text: &str) -> Value {
    if NULL_MARKERS.contains(&text) {
        return Value::Null;
    }

    match text {
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }

    let looks_numeric = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if looks_numeric
        && let Ok(float) = text.parse::<f64>()
        && let Some(number) = Number::from_f64(float)
    {
        return Value::Number(number);
    }

    Value::String(text.to_owned())
}
