use std::sync::Arc;
use std::time::Duration;

use config::shared::{BatchConfig, FailurePolicy, IdentityFields, TransformConfig};
use martech::connection::{ConnectionResolver, SecretBundleCache};
use martech::delivery::{ReqwestTransport, RetryPolicy};
use martech::destination::{DeliverySetup, Destination};
use martech::pipeline::SyncPipeline;
use martech::secrets::MemorySecretsStore;
use martech::transform::{RecordTransformer, TransformRegistry};
use martech::types::Record;
use serde_json::Value;

pub const SECRET_NAME: &str = "martech_dev";

/// Builds a resolver over a memory secrets store holding `bundle`.
pub async fn resolver(bundle: Value) -> ConnectionResolver {
    let store = MemorySecretsStore::new();
    store.insert(SECRET_NAME, bundle.to_string()).await;

    ConnectionResolver::new(Arc::new(store), SECRET_NAME, SecretBundleCache::new())
}

/// Real HTTP transport with short backoff delays.
pub fn setup() -> DeliverySetup {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50), 2.0);

    DeliverySetup::new(Arc::new(transport), policy)
}

pub fn pipeline<D>(destination: D, transform: TransformConfig) -> SyncPipeline<D>
where
    D: Destination + Send + Sync,
{
    let transformer = RecordTransformer::new(&transform, &TransformRegistry::with_builtins()).unwrap();

    SyncPipeline::new(
        destination,
        transformer,
        BatchConfig::default(),
        FailurePolicy::Continue,
    )
}

pub fn identity_by(field: &str) -> TransformConfig {
    TransformConfig {
        identity_fields: IdentityFields::Single(field.to_owned()),
        ..TransformConfig::default()
    }
}

pub fn records(values: Vec<Value>) -> Vec<Record> {
    martech::test_utils::fixtures::records(values)
}
