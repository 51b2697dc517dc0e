//! Secrets manager collaborator.

#[cfg(feature = "aws")]
mod aws;
mod base;
mod memory;

#[cfg(feature = "aws")]
pub use aws::AwsSecretsManagerStore;
pub use base::SecretsStore;
pub use memory::MemorySecretsStore;
