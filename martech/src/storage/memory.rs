use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::MartechResult;
use crate::storage::ObjectStore;

type Buckets = BTreeMap<String, BTreeMap<String, Bytes>>;

/// In-memory object store for tests and dry runs.
///
/// Keys are kept sorted, so listings come back in lexicographic order like S3's.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `(bucket, key)` pair currently stored.
    pub async fn objects(&self) -> Vec<(String, String)> {
        let buckets = self.buckets.read().await;
        buckets
            .iter()
            .flat_map(|(bucket, objects)| {
                objects
                    .keys()
                    .map(move |key| (bucket.clone(), key.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> MartechResult<()> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_owned())
            .or_default()
            .insert(key.to_owned(), data);

        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> MartechResult<Option<Bytes>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned())
    }

    async fn exists(&self, bucket: &str, key: &str) -> MartechResult<bool> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }

    async fn list_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> MartechResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let mut prefixes = BTreeSet::new();
        for key in objects.keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(position) = rest.find(delimiter) {
                let end = prefix.len() + position + delimiter.len();
                prefixes.insert(key[..end].to_owned());
            }
        }

        Ok(prefixes.into_iter().collect())
    }

    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> MartechResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        Ok(objects
            .keys()
            .filter(|key| match key.strip_prefix(prefix) {
                Some(rest) => delimiter.is_none_or(|delimiter| !rest.contains(delimiter)),
                None => false,
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, bucket: &str, keys: &[String]) -> MartechResult<()> {
        let mut buckets = self.buckets.write().await;
        if let Some(objects) = buckets.get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }

        Ok(())
    }
}
