use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested, wait_for_shutdown};
use crate::delivery::{HttpRequest, HttpResponse, HttpTransport, RetryPolicy};
use crate::error::{ErrorKind, MartechError, MartechResult};
use crate::failpoints::{DELIVERY_CLIENT__BEFORE_ATTEMPT, martech_fail_point};
use crate::{bail, martech_error};

/// Sends requests to a single destination base url with bounded retries.
///
/// Completed exchanges are returned whatever their status; classifying statuses belongs to the
/// destination. Only transport failures accepted by the [`RetryPolicy`] are retried.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    policy: RetryPolicy,
    shutdown_rx: Option<ShutdownRx>,
}

impl DeliveryClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: Url, policy: RetryPolicy) -> Self {
        Self {
            transport,
            base_url: with_trailing_slash(base_url),
            policy,
            shutdown_rx: None,
        }
    }

    /// Aborts in-flight calls and backoff sleeps once shutdown is requested.
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownRx) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolves the full url of `request` against the base url.
    pub fn url_for(&self, request: &HttpRequest) -> MartechResult<Url> {
        let mut url = self
            .base_url
            .join(request.endpoint.trim_start_matches('/'))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        Ok(url)
    }

    /// Sends `request`, retrying transient failures with exponential backoff.
    ///
    /// Exhausting the attempts returns a [`ErrorKind::DeliveryError`] whose source is the last
    /// failure. Shutdown returns [`ErrorKind::OperationCanceled`].
    pub async fn send(&self, request: HttpRequest) -> MartechResult<HttpResponse> {
        let url = self.url_for(&request)?;
        let mut attempt = 1;

        loop {
            self.check_shutdown()?;

            let result = match martech_fail_point(DELIVERY_CLIENT__BEFORE_ATTEMPT) {
                Ok(()) => self.execute(url.clone(), request.clone()).await,
                Err(err) => Err(err),
            };

            let err = match result {
                Ok(response) => {
                    debug!(
                        url = %url,
                        status = response.status,
                        attempt,
                        "destination call completed"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            if err.kind() == ErrorKind::OperationCanceled {
                return Err(err);
            }

            if !self.policy.is_retryable(&err) {
                return Err(err);
            }

            if attempt >= self.policy.max_attempts() {
                return Err(exhausted(&url, attempt, err));
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                url = %url,
                attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "destination call failed, retrying"
            );

            self.sleep(delay).await?;
            attempt += 1;
        }
    }

    async fn execute(&self, url: Url, request: HttpRequest) -> MartechResult<HttpResponse> {
        let call = self.transport.execute(url, request);

        match &self.shutdown_rx {
            Some(shutdown_rx) => {
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::select! {
                    biased;

                    _ = wait_for_shutdown(&mut shutdown_rx) => {
                        Err(canceled())
                    }
                    result = call => result,
                }
            }
            None => call.await,
        }
    }

    async fn sleep(&self, delay: std::time::Duration) -> MartechResult<()> {
        match &self.shutdown_rx {
            Some(shutdown_rx) => {
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::select! {
                    biased;

                    _ = wait_for_shutdown(&mut shutdown_rx) => Err(canceled()),
                    _ = tokio::time::sleep(delay) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn check_shutdown(&self) -> MartechResult<()> {
        if let Some(shutdown_rx) = &self.shutdown_rx
            && is_shutdown_requested(shutdown_rx)
        {
            bail!(
                ErrorKind::OperationCanceled,
                "Delivery canceled because shutdown was requested"
            );
        }

        Ok(())
    }
}

fn canceled() -> MartechError {
    martech_error!(
        ErrorKind::OperationCanceled,
        "Delivery canceled because shutdown was requested"
    )
}

fn exhausted(url: &Url, attempts: u32, last_error: MartechError) -> MartechError {
    martech_error!(
        ErrorKind::DeliveryError,
        "Destination call failed after all retry attempts",
        format!("{attempts} attempts to {url}"),
        source: last_error
    )
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
