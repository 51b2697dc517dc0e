use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::MartechResult;
use crate::secrets::{MemorySecretsStore, SecretsStore};

/// Secrets store counting every lookup, found or not.
#[derive(Debug, Clone, Default)]
pub struct CountingSecretsStore {
    inner: MemorySecretsStore,
    calls: Arc<AtomicUsize>,
}

impl CountingSecretsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: impl Into<String>, payload: impl Into<String>) {
        self.inner.insert(name, payload).await;
    }

    /// Returns the number of lookups made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretsStore for CountingSecretsStore {
    async fn get_secret(&self, name: &str) -> MartechResult<SecretString> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_secret(name).await
    }
}
