//! Bulk delivery of customer profiles and events to marketing platforms.
//!
//! A run reads records from a [`source`], passes each one through the declarative
//! [`transform`] pipeline, groups the results into size-bounded batches with [`batching`] and
//! delivers them through a [`destination`] adapter. [`pipeline::SyncPipeline`] ties these
//! together and returns a [`types::RunReport`].
//!
//! Destination credentials come from a secrets bundle resolved once per run by
//! [`connection::ConnectionResolver`]. HTTP calls go through [`delivery::DeliveryClient`], which
//! retries transient failures with exponential backoff.

pub mod batching;
pub mod concurrency;
pub mod connection;
pub mod delivery;
pub mod destination;
mod egress;
pub mod error;
mod failpoints;
mod macros;
pub mod metrics;
pub mod pipeline;
pub mod secrets;
pub mod source;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;

pub use failpoints::{DELIVERY_CLIENT__BEFORE_ATTEMPT, SYNC_PIPELINE__BEFORE_BATCH};
