use async_trait::async_trait;
use bytes::Bytes;

use crate::error::MartechResult;

/// Byte-blob storage organized in buckets of keys.
///
/// Writes overwrite existing keys, which makes staging idempotent across re-runs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key`, replacing any existing object.
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> MartechResult<()>;

    /// Returns the object stored under `key`, or `None` when it does not exist.
    async fn get(&self, bucket: &str, key: &str) -> MartechResult<Option<Bytes>>;

    /// Returns `true` when an object is stored under `key`.
    async fn exists(&self, bucket: &str, key: &str) -> MartechResult<bool>;

    /// Lists the common prefixes one `delimiter` level below `prefix`.
    async fn list_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> MartechResult<Vec<String>>;

    /// Lists the keys starting with `prefix`.
    ///
    /// With a delimiter, only keys with no further delimiter after `prefix` are returned.
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> MartechResult<Vec<String>>;

    /// Deletes `keys`. Missing keys are ignored.
    async fn delete(&self, bucket: &str, keys: &[String]) -> MartechResult<()>;

    /// Returns `true` when at least one key starts with `prefix`.
    async fn prefix_exists(&self, bucket: &str, prefix: &str) -> MartechResult<bool> {
        let keys = self.list_keys(bucket, prefix, None).await?;
        Ok(!keys.is_empty())
    }
}
