//! Object store collaborator used for CSV sources and file staging.

mod base;
mod location;
mod memory;
#[cfg(feature = "aws")]
mod s3;

pub use base::ObjectStore;
pub use location::ObjectLocation;
pub use memory::MemoryObjectStore;
#[cfg(feature = "aws")]
pub use s3::{S3ObjectStore, S3ObjectStoreConfig};
