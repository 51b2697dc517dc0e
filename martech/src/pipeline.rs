use config::shared::{BatchConfig, FailurePolicy};
use tracing::{error, info, warn};

use crate::batching::AdaptiveBatcher;
use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested};
use crate::destination::{Destination, RunContext};
use crate::error::{ErrorKind, MartechResult};
use crate::failpoints::{SYNC_PIPELINE__BEFORE_BATCH, martech_fail_point};
use crate::metrics::{BATCH_DELIVERED_MESSAGE, RUN_SUMMARY_MESSAGE};
use crate::source::RecordSource;
use crate::transform::{RecordTransformer, TransformStats};
use crate::types::{Batch, DeliveryOutcome, Operation, RunCounters, RunReport};
use crate::{bail, egress_info};

/// Runs one operation end to end: reads records, transforms them, batches them and delivers
/// every batch to a single destination, in order.
#[derive(Debug)]
pub struct SyncPipeline<D> {
    destination: D,
    transformer: RecordTransformer,
    batch_config: BatchConfig,
    failure_policy: FailurePolicy,
    shutdown_rx: Option<ShutdownRx>,
}

impl<D> SyncPipeline<D>
where
    D: Destination + Send + Sync,
{
    pub fn new(
        destination: D,
        transformer: RecordTransformer,
        batch_config: BatchConfig,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            destination,
            transformer,
            batch_config,
            failure_policy,
            shutdown_rx: None,
        }
    }

    /// Stops runs between chunks and batches once shutdown is requested.
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownRx) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub async fn upload_profiles(
        &self,
        source: &mut dyn RecordSource,
    ) -> MartechResult<RunReport> {
        self.run(Operation::UploadProfiles, source).await
    }

    pub async fn upload_events(&self, source: &mut dyn RecordSource) -> MartechResult<RunReport> {
        self.run(Operation::UploadEvents, source).await
    }

    pub async fn delete_profiles(
        &self,
        source: &mut dyn RecordSource,
    ) -> MartechResult<RunReport> {
        self.run(Operation::DeleteProfiles, source).await
    }

    /// Performs `operation` for every record of `source`.
    ///
    /// Configuration problems fail the run before any record is read. With
    /// [`FailurePolicy::Continue`] failed batches are recorded in the report, with
    /// [`FailurePolicy::FailFast`] the first one ends the run with its error. A requested
    /// shutdown returns the report of what was delivered so far, marked as cancelled.
    pub async fn run(
        &self,
        operation: Operation,
        source: &mut dyn RecordSource,
    ) -> MartechResult<RunReport> {
        if !self.destination.supports(operation) {
            bail!(
                ErrorKind::ConfigError,
                "The destination does not support the operation",
                format!("{} cannot {operation}", D::name())
            );
        }
        self.destination.prepare(operation)?;

        let context = RunContext::start();
        let batcher = AdaptiveBatcher::new(self.destination.encoder(operation), &self.batch_config)
            .with_record_cap(self.destination.max_batch_records(operation));

        let mut report = RunReport {
            run_id: context.run_id,
            destination: D::name(),
            operation,
            outcomes: Vec::new(),
            counters: RunCounters::default(),
            cancelled: false,
        };

        info!(
            run_id = %context.run_id,
            destination = D::name(),
            operation = %operation,
            "starting sync run"
        );

        let mut next_batch_index = 0;
        'chunks: loop {
            if self.shutdown_requested() {
                report.cancelled = true;
                break;
            }

            let Some(chunk) = source.next_chunk().await? else {
                break;
            };
            report.counters.total_processed += chunk.len();

            // We transform and envelope the whole chunk before batching, so that batches are
            // sized on the exact payload the destination receives.
            let mut stats = TransformStats::default();
            let mut enveloped = Vec::with_capacity(chunk.len());
            for record in chunk {
                let Some(transformed) = self.transformer.transform(record, &mut stats) else {
                    continue;
                };

                match self.destination.envelope(operation, transformed) {
                    Ok(record) => enveloped.push(record),
                    Err(err) => {
                        warn!(error = %err, "record cannot be enveloped, dropping it");
                        stats.invalid += 1;
                    }
                }
            }
            report.counters.total_invalid += stats.invalid;
            report.counters.coercion_warnings += stats.coercion_warnings;

            let batches = batcher.batches(enveloped, next_batch_index)?;
            next_batch_index += batches.len();

            for batch in batches {
                if self.shutdown_requested() {
                    report.cancelled = true;
                    break 'chunks;
                }

                let outcome = match self.deliver(operation, &batch, &context).await {
                    Ok(outcome) => outcome,
                    Err(err) if err.kind() == ErrorKind::OperationCanceled => {
                        info!(batch_index = batch.index, "delivery canceled by shutdown");
                        report.cancelled = true;
                        break 'chunks;
                    }
                    Err(err) => DeliveryOutcome::failed(batch.index, batch.len(), None, err, None),
                };

                report.counters.record_outcome(&outcome);

                if let Some(err) = &outcome.error {
                    error!(
                        destination = D::name(),
                        batch_index = batch.index,
                        records = batch.len(),
                        http_status = ?outcome.http_status,
                        error = %err,
                        "batch delivery failed"
                    );

                    if self.failure_policy == FailurePolicy::FailFast {
                        let err = err.clone();
                        report.outcomes.push(outcome);
                        log_summary(&report);
                        return Err(err);
                    }
                }

                report.outcomes.push(outcome);
            }
        }

        log_summary(&report);

        Ok(report)
    }

    async fn deliver(
        &self,
        operation: Operation,
        batch: &Batch,
        context: &RunContext,
    ) -> MartechResult<DeliveryOutcome> {
        martech_fail_point(SYNC_PIPELINE__BEFORE_BATCH)?;

        let response = self
            .destination
            .write_batch(operation, batch, context)
            .await?;

        if response.is_accepted() {
            egress_info!(
                BATCH_DELIVERED_MESSAGE,
                destination = D::name(),
                operation = %operation,
                batch_index = batch.index,
                records = batch.len(),
                bytes = batch.size_bytes,
                rejected_records = response.rejected_records
            );
        }

        Ok(response.into_outcome(batch))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_rx.as_ref().is_some_and(is_shutdown_requested)
    }
}

fn log_summary(report: &RunReport) {
    let counters = &report.counters;
    info!(
        message = RUN_SUMMARY_MESSAGE,
        run_id = %report.run_id,
        destination = report.destination,
        operation = %report.operation,
        total_processed = counters.total_processed,
        total_sent = counters.total_sent,
        total_invalid = counters.total_invalid,
        total_failed = counters.total_failed,
        coercion_warnings = counters.coercion_warnings,
        batches_succeeded = counters.batches_succeeded,
        batches_failed = counters.batches_failed,
        cancelled = report.cancelled
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use config::shared::{Coercion, EventConfig, IdentityFields, TransformConfig};
    use serde_json::{Value, json};

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::delivery::RetryPolicy;
    use crate::destination::{ClevertapDestination, DeliverySetup, MemoryDestination};
    use crate::source::InlineSource;
    use crate::test_utils::fixtures::{connection, records};
    use crate::test_utils::transport::{ScriptedReply, ScriptedTransport};
    use crate::transform::TransformRegistry;

    fn transformer() -> RecordTransformer {
        let mut config = TransformConfig {
            identity_fields: IdentityFields::Ordered(vec!["customer_id".into(), "email".into()]),
            ..TransformConfig::default()
        };
        config.type_map.insert("age".into(), Coercion::Int);

        RecordTransformer::new(&config, &TransformRegistry::with_builtins()).unwrap()
    }

    fn pipeline(
        destination: MemoryDestination,
        max_records: usize,
        failure_policy: FailurePolicy,
    ) -> SyncPipeline<MemoryDestination> {
        let batch_config = BatchConfig {
            max_records: Some(max_records),
            ..BatchConfig::default()
        };

        SyncPipeline::new(destination, transformer(), batch_config, failure_policy)
    }

    fn source(values: Vec<Value>, chunk_size: usize) -> InlineSource {
        InlineSource::new(records(values), chunk_size)
    }

    #[tokio::test]
    async fn delivers_every_valid_record_in_order() {
        let destination = MemoryDestination::new();
        let pipeline = pipeline(destination.clone(), 2, FailurePolicy::Continue);
        let mut source = source(
            vec![
                json!({"customer_id": 1, "age": "31"}),
                json!({"customer_id": null, "email": ""}),
                json!({"customer_id": 2, "age": "n/a"}),
                json!({"email": "c@example.com"}),
                json!({"customer_id": 4}),
            ],
            3,
        );

        let report = pipeline.upload_profiles(&mut source).await.unwrap();

        assert_eq!(report.destination, "memory");
        assert_eq!(report.counters.total_processed, 5);
        assert_eq!(report.counters.total_invalid, 1);
        assert_eq!(report.counters.total_sent, 4);
        assert_eq!(report.counters.coercion_warnings, 1);
        assert!(!report.had_failures());

        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.batch_index).collect();
        assert_eq!(indices, vec![0, 1]);

        let identities: Vec<Value> = destination
            .records()
            .await
            .into_iter()
            .map(|record| record["identity"].clone())
            .collect();
        assert_eq!(
            identities,
            vec![json!(1), json!(2), json!("c@example.com"), json!(4)]
        );
    }

    #[tokio::test]
    async fn continue_policy_reports_failed_batches() {
        let destination = MemoryDestination::new();
        destination.reject_batches([0]).await;
        let pipeline = pipeline(destination.clone(), 1, FailurePolicy::Continue);
        let mut source = source(vec![json!({"customer_id": 1}), json!({"customer_id": 2})], 10);

        let report = pipeline.upload_events(&mut source).await.unwrap();

        assert!(report.had_failures());
        assert_eq!(report.counters.total_failed, 1);
        assert_eq!(report.counters.total_sent, 1);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(destination.writes().await.len(), 1);
    }

    #[tokio::test]
    async fn fail_fast_stops_at_the_first_failed_batch() {
        let destination = MemoryDestination::new();
        destination.reject_batches([1]).await;
        let pipeline = pipeline(destination.clone(), 1, FailurePolicy::FailFast);
        let mut source = source(
            vec![
                json!({"customer_id": 1}),
                json!({"customer_id": 2}),
                json!({"customer_id": 3}),
            ],
            10,
        );

        let err = pipeline.upload_profiles(&mut source).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationRejected);
        assert_eq!(destination.writes().await.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_returns_a_partial_report() {
        let destination = MemoryDestination::new();
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let pipeline = pipeline(destination.clone(), 1, FailurePolicy::Continue)
            .with_shutdown(shutdown_rx);
        shutdown_tx.shutdown().unwrap();
        let mut source = source(vec![json!({"customer_id": 1})], 10);

        let report = pipeline.delete_profiles(&mut source).await.unwrap();

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.counters.total_processed, 0);
    }

    #[tokio::test]
    async fn shutdown_during_a_delivery_cancels_the_run() {
        let transport = ScriptedTransport::new();
        transport.push(ScriptedReply::Hang);
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let setup = DeliverySetup::new(Arc::new(transport.clone()), RetryPolicy::no_retry())
            .with_shutdown(shutdown_rx.clone());
        let destination = ClevertapDestination::from_connection(
            &connection(
                "clevertap_default",
                json!({"login": "ACC-1", "password": "pass"}),
            ),
            EventConfig::default(),
            &setup,
        )
        .unwrap();
        let pipeline = SyncPipeline::new(
            destination,
            transformer(),
            BatchConfig::default(),
            FailurePolicy::FailFast,
        )
        .with_shutdown(shutdown_rx);
        let mut source = source(vec![json!({"customer_id": 1}), json!({"customer_id": 2})], 10);

        let (report, ()) = tokio::join!(pipeline.upload_profiles(&mut source), async {
            while transport.attempts() == 0 {
                tokio::task::yield_now().await;
            }
            shutdown_tx.shutdown().unwrap();
        });

        let report = report.unwrap();
        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.counters.total_processed, 2);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn batch_indices_continue_across_chunks() {
        let destination = MemoryDestination::new();
        let pipeline = pipeline(destination.clone(), 2, FailurePolicy::Continue);
        let mut source = source(
            (1..=5).map(|id| json!({"customer_id": id})).collect(),
            3,
        );

        let report = pipeline.upload_profiles(&mut source).await.unwrap();

        let indices: Vec<usize> = destination
            .writes()
            .await
            .iter()
            .map(|(_, batch)| batch.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(report.counters.batches_succeeded, 3);
    }
}
