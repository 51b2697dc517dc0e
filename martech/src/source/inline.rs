use async_trait::async_trait;

use crate::error::MartechResult;
use crate::source::RecordSource;
use crate::types::Record;

/// Source serving records held in memory, in fixed-size chunks.
#[derive(Debug)]
pub struct InlineSource {
    records: std::vec::IntoIter<Record>,
    chunk_size: usize,
}

impl InlineSource {
    /// Creates a source yielding `records` in chunks of `chunk_size` (at least 1).
    pub fn new(records: Vec<Record>, chunk_size: usize) -> Self {
        Self {
            records: records.into_iter(),
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl RecordSource for InlineSource {
    async fn next_chunk(&mut self) -> MartechResult<Option<Vec<Record>>> {
        let chunk: Vec<Record> = self.records.by_ref().take(self.chunk_size).collect();
        if chunk.is_empty() {
            return Ok(None);
        }

        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn yields_records_in_chunks() {
        let records: Vec<Record> = (0..5)
            .map(|i| {
                let mut record = Record::new();
                record.insert("customer_id".into(), json!(i));
                record
            })
            .collect();
        let mut source = InlineSource::new(records, 2);

        let mut sizes = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }

        assert_eq!(sizes, vec![2, 2, 1]);
    }
}
