use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::MartechResult;

/// Read access to a secrets manager.
///
/// Implementations return [`crate::error::ErrorKind::SecretNotFound`] when no secret exists
/// under the requested name.
#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Returns the payload of the secret stored under `name`.
    async fn get_secret(&self, name: &str) -> MartechResult<SecretString>;
}
