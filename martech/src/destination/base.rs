use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::batching::BatchEncoder;
use crate::concurrency::shutdown::ShutdownRx;
use crate::delivery::{DeliveryClient, HttpResponse, HttpTransport, RetryPolicy};
use crate::error::{ErrorKind, MartechError, MartechResult};
use crate::martech_error;
use crate::source::ist_now;
use crate::types::{Batch, DeliveryOutcome, Operation, Record, TransformedRecord};

/// Trait for marketing platforms that receive transformed customer records.
///
/// A [`Destination`] owns the platform specific parts of a run: the envelope each record is
/// wrapped in, the payload encoding used to size batches, and the request shaping of a single
/// batch. Batching, transformation and run accounting are handled by
/// [`crate::pipeline::SyncPipeline`].
///
/// Implementations are built by an async `open` constructor that resolves their connection once,
/// so writing a batch never touches the secrets store.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Returns whether the destination implements `operation`.
    fn supports(&self, operation: Operation) -> bool;

    /// Checks that everything `operation` needs is configured, before any record is read.
    ///
    /// The default implementation accepts every supported operation.
    fn prepare(&self, _operation: Operation) -> MartechResult<()> {
        Ok(())
    }

    /// Wraps a transformed record into the shape the destination expects for `operation`.
    ///
    /// An error drops the record from the run and counts it as invalid.
    fn envelope(&self, operation: Operation, record: TransformedRecord) -> MartechResult<Record>;

    /// Returns the encoder whose output size bounds the batches of `operation`.
    fn encoder(&self, operation: Operation) -> &dyn BatchEncoder;

    /// Returns the largest number of records the destination accepts in one call.
    fn max_batch_records(&self, _operation: Operation) -> Option<usize> {
        None
    }

    /// Delivers one batch of enveloped records.
    ///
    /// Completed exchanges are reported through [`DeliveryResponse`], including the ones the
    /// destination refused. An `Err` means no exchange completed: retries ran out, staging
    /// failed or the run was canceled.
    fn write_batch(
        &self,
        operation: Operation,
        batch: &Batch,
        context: &RunContext,
    ) -> impl Future<Output = MartechResult<DeliveryResponse>> + Send;

    /// Propagates the end of the run to the destination.
    ///
    /// The default implementation is a no-op.
    fn shutdown(&self) -> impl Future<Output = MartechResult<()>> + Send {
        async { Ok(()) }
    }
}

/// Identity of a single run, shared by every batch it delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Start of the run in Indian Standard Time.
    pub started_at: DateTime<FixedOffset>,
}

impl RunContext {
    pub fn new(run_id: Uuid, started_at: DateTime<FixedOffset>) -> Self {
        Self { run_id, started_at }
    }

    /// Starts a new run with a random id.
    pub fn start() -> Self {
        Self::new(Uuid::new_v4(), ist_now())
    }
}

/// Shared delivery collaborators handed to every destination `open` constructor.
#[derive(Clone)]
pub struct DeliverySetup {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    shutdown_rx: Option<ShutdownRx>,
}

impl DeliverySetup {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            shutdown_rx: None,
        }
    }

    /// Lets clients built from this setup abort once shutdown is requested.
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownRx) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Builds a [`DeliveryClient`] sending to `base_url`.
    pub fn client(&self, base_url: Url) -> DeliveryClient {
        let client = DeliveryClient::new(self.transport.clone(), base_url, self.policy);
        match &self.shutdown_rx {
            Some(shutdown_rx) => client.with_shutdown(shutdown_rx.clone()),
            None => client,
        }
    }
}

/// What a destination answered for one batch.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    pub http_status: Option<u16>,
    /// Parsed response body, when it was JSON.
    pub body: Option<Value>,
    /// Records the destination accepted the call for but did not process.
    pub rejected_records: usize,
    /// Why the destination refused the batch.
    pub error: Option<MartechError>,
}

impl DeliveryResponse {
    pub fn accepted(http_status: Option<u16>, body: Option<Value>, rejected_records: usize) -> Self {
        Self {
            http_status,
            body,
            rejected_records,
            error: None,
        }
    }

    pub fn rejected(http_status: Option<u16>, body: Option<Value>, error: MartechError) -> Self {
        Self {
            http_status,
            body,
            rejected_records: 0,
            error: Some(error),
        }
    }

    /// Returns `true` when the destination took the batch.
    pub fn is_accepted(&self) -> bool {
        self.error.is_none()
    }

    /// Converts the response into the outcome of `batch`.
    pub fn into_outcome(self, batch: &Batch) -> DeliveryOutcome {
        match self.error {
            None => DeliveryOutcome::success(
                batch.index,
                batch.len(),
                self.http_status,
                self.body,
                self.rejected_records,
            ),
            Some(error) => DeliveryOutcome::failed(
                batch.index,
                batch.len(),
                self.http_status,
                error,
                self.body,
            ),
        }
    }
}

/// Rejects exchanges that did not complete with a 2xx status.
pub(crate) fn check_status(
    destination: &'static str,
    response: &HttpResponse,
) -> Result<(), DeliveryResponse> {
    if response.is_success() {
        return Ok(());
    }

    warn!(
        destination,
        status = response.status,
        body = %response.text(),
        "destination refused the batch"
    );

    Err(DeliveryResponse::rejected(
        Some(response.status),
        response.json().ok(),
        martech_error!(
            ErrorKind::DestinationRejected,
            "Destination refused the batch",
            format!("{destination} answered {}: {}", response.status, response.text())
        ),
    ))
}

/// Parses the body of a 2xx exchange, rejecting bodies that are not JSON.
pub(crate) fn json_body(
    destination: &'static str,
    response: &HttpResponse,
) -> Result<Value, DeliveryResponse> {
    check_status(destination, response)?;

    response.json().map_err(|err| {
        warn!(destination, error = %err, "destination answered with a malformed body");
        DeliveryResponse::rejected(Some(response.status), None, err)
    })
}
