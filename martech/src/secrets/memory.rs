use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::bail;
use crate::error::{ErrorKind, MartechResult};
use crate::secrets::SecretsStore;

/// In-memory secrets store for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretsStore {
    secrets: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySecretsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `payload` under `name`, replacing any previous payload.
    pub async fn insert(&self, name: impl Into<String>, payload: impl Into<String>) {
        self.secrets
            .write()
            .await
            .insert(name.into(), payload.into());
    }
}

#[async_trait]
impl SecretsStore for MemorySecretsStore {
    async fn get_secret(&self, name: &str) -> MartechResult<SecretString> {
        let secrets = self.secrets.read().await;
        let Some(payload) = secrets.get(name) else {
            bail!(ErrorKind::SecretNotFound, "Secret not found", name);
        };

        Ok(SecretString::new(payload.clone()))
    }
}
