mod batch;
mod outcome;
mod record;

pub use batch::Batch;
pub use config::shared::Operation;
pub use outcome::{DeliveryOutcome, OutcomeStatus, RunCounters, RunReport};
pub use record::{Record, TransformedRecord, is_truthy, value_to_cell};
