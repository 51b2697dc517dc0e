//! Marketing platforms records are delivered to.

mod base;
mod clevertap;
mod gamooga;
mod memory;
mod netcore;

pub use base::{DeliveryResponse, DeliverySetup, Destination, RunContext};
pub use clevertap::{CLEVERTAP_BASE_URL, CLEVERTAP_DELETE_BASE_URL, ClevertapDestination};
pub use gamooga::{GAMOOGA_MAX_BATCH_RECORDS, GamoogaDestination};
pub use memory::MemoryDestination;
pub use netcore::{DEFAULT_NOTIFY_EMAIL, NETCORE_BASE_URL, NetcoreDestination};
