use config::shared::Operation;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorKind, MartechError};

/// Whether a batch reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Result of delivering one batch.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Index of the batch within its run.
    pub batch_index: usize,
    /// Number of records in the batch.
    pub record_count: usize,
    /// Delivery status.
    pub status: OutcomeStatus,
    /// HTTP status of the final exchange, when one completed.
    pub http_status: Option<u16>,
    /// Why the batch failed.
    pub error: Option<MartechError>,
    /// Parsed response body, kept opaque.
    pub response_body: Option<Value>,
    /// Records the destination accepted the request for but did not process.
    pub rejected_records: usize,
}

impl DeliveryOutcome {
    /// Builds the outcome of a delivered batch.
    pub fn success(
        batch_index: usize,
        record_count: usize,
        http_status: Option<u16>,
        response_body: Option<Value>,
        rejected_records: usize,
    ) -> Self {
        Self {
            batch_index,
            record_count,
            status: OutcomeStatus::Success,
            http_status,
            error: None,
            response_body,
            rejected_records,
        }
    }

    /// Builds the outcome of a batch that could not be delivered.
    pub fn failed(
        batch_index: usize,
        record_count: usize,
        http_status: Option<u16>,
        error: MartechError,
        response_body: Option<Value>,
    ) -> Self {
        Self {
            batch_index,
            record_count,
            status: OutcomeStatus::Failed,
            http_status,
            error: Some(error),
            response_body,
            rejected_records: record_count,
        }
    }

    /// Returns `true` when the batch was delivered.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Returns the kind of the failure, if the batch failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(MartechError::kind)
    }
}

/// Per-run accounting, owned by a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Records read from the source.
    pub total_processed: usize,
    /// Records in delivered batches.
    pub total_sent: usize,
    /// Records dropped because no identity could be resolved.
    pub total_invalid: usize,
    /// Records in batches that failed.
    pub total_failed: usize,
    /// Field coercions that failed and kept their original value.
    pub coercion_warnings: usize,
    /// Delivered batches.
    pub batches_succeeded: usize,
    /// Failed batches.
    pub batches_failed: usize,
}

impl RunCounters {
    /// Accounts for the outcome of one batch.
    pub fn record_outcome(&mut self, outcome: &DeliveryOutcome) {
        match outcome.status {
            OutcomeStatus::Success => {
                self.batches_succeeded += 1;
                self.total_sent += outcome.record_count;
            }
            OutcomeStatus::Failed => {
                self.batches_failed += 1;
                self.total_failed += outcome.record_count;
            }
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Unique id of the run, also used in staged file names.
    pub run_id: Uuid,
    /// Name of the destination.
    pub destination: &'static str,
    /// The performed operation.
    pub operation: Operation,
    /// One outcome per batch, in batch order.
    pub outcomes: Vec<DeliveryOutcome>,
    /// Run accounting.
    pub counters: RunCounters,
    /// Whether the run stopped early because shutdown was requested.
    pub cancelled: bool,
}

impl RunReport {
    /// Returns `true` when at least one batch failed.
    pub fn had_failures(&self) -> bool {
        self.counters.batches_failed > 0
    }

    /// Returns the outcomes of failed batches.
    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}
