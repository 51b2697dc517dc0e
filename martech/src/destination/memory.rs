use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::batching::{BatchEncoder, JsonArrayEncoder};
use crate::destination::{Destination, DeliveryResponse, RunContext};
use crate::error::{ErrorKind, MartechResult};
use crate::martech_error;
use crate::types::{Batch, Operation, Record, TransformedRecord};

const ENCODER: JsonArrayEncoder = JsonArrayEncoder::bare();

#[derive(Debug, Default)]
struct Inner {
    writes: Vec<(Operation, Batch)>,
    rejected_batches: HashSet<usize>,
    shutdown_called: bool,
}

/// In-memory destination for dry runs and tests.
///
/// Every batch is kept with the operation it was written for. Records are enveloped as their
/// transformed data with the resolved identity stored under `identity`.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the batches with the given indices fail as if the destination refused them.
    pub async fn reject_batches(&self, indices: impl IntoIterator<Item = usize>) {
        let mut inner = self.inner.lock().await;
        inner.rejected_batches.extend(indices);
    }

    /// Returns every accepted write, in write order.
    pub async fn writes(&self) -> Vec<(Operation, Batch)> {
        let inner = self.inner.lock().await;
        inner.writes.clone()
    }

    /// Returns every accepted record, in write order.
    pub async fn records(&self) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner
            .writes
            .iter()
            .flat_map(|(_, batch)| batch.records.iter().cloned())
            .collect()
    }

    pub async fn shutdown_called(&self) -> bool {
        self.inner.lock().await.shutdown_called
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    fn envelope(&self, _operation: Operation, record: TransformedRecord) -> MartechResult<Record> {
        let mut enveloped = Record::with_capacity(record.data.len() + 1);
        enveloped.insert("identity".to_owned(), record.identity);
        for (key, value) in record.data {
            if key != "identity" {
                enveloped.insert(key, value);
            }
        }

        Ok(enveloped)
    }

    fn encoder(&self, _operation: Operation) -> &dyn BatchEncoder {
        &ENCODER
    }

    async fn write_batch(
        &self,
        operation: Operation,
        batch: &Batch,
        _context: &RunContext,
    ) -> MartechResult<DeliveryResponse> {
        let mut inner = self.inner.lock().await;

        if inner.rejected_batches.contains(&batch.index) {
            return Ok(DeliveryResponse::rejected(
                None,
                None,
                martech_error!(
                    ErrorKind::DestinationRejected,
                    "Memory destination refused the batch",
                    format!("batch {}", batch.index)
                ),
            ));
        }

        info!(
            operation = %operation,
            batch_index = batch.index,
            records = batch.len(),
            "writing batch to memory destination"
        );
        inner.writes.push((operation, batch.clone()));

        Ok(DeliveryResponse::accepted(
            None,
            Some(Value::from(batch.len())),
            0,
        ))
    }

    async fn shutdown(&self) -> MartechResult<()> {
        self.inner.lock().await.shutdown_called = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_puts_identity_first() {
        let destination = MemoryDestination::new();
        let mut data = Record::new();
        data.insert("email".into(), json!("a@example.com"));

        let enveloped = destination
            .envelope(
                Operation::UploadProfiles,
                TransformedRecord {
                    identity: json!(7),
                    data,
                },
            )
            .unwrap();

        assert_eq!(
            Value::Object(enveloped),
            json!({"identity": 7, "email": "a@example.com"})
        );
    }

    #[tokio::test]
    async fn rejected_batches_are_not_stored() {
        let destination = MemoryDestination::new();
        destination.reject_batches([1]).await;
        let context = RunContext::start();
        let batch = |index| Batch {
            index,
            records: vec![Record::new()],
            size_bytes: 4,
        };

        let first = destination
            .write_batch(Operation::UploadEvents, &batch(0), &context)
            .await
            .unwrap();
        let second = destination
            .write_batch(Operation::UploadEvents, &batch(1), &context)
            .await
            .unwrap();

        assert!(first.is_accepted());
        assert!(!second.is_accepted());
        assert_eq!(destination.writes().await.len(), 1);
    }
}
