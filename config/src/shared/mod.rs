//! Shared configuration types for sync runs.

mod base;
mod batch;
mod destination;
mod retry;
mod run;
mod secrets;
mod source;
mod syncer;
mod transform;

pub use base::ValidationError;
pub use batch::{BatchConfig, BatchStrategy};
pub use destination::{DestinationConfig, EventConfig};
pub use retry::RetryConfig;
pub use run::{FailurePolicy, Operation};
pub use secrets::SecretsConfig;
pub use source::SourceConfig;
pub use syncer::SyncerConfig;
pub use transform::{Coercion, IdentityFields, TransformConfig};
