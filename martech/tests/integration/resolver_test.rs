use std::sync::Arc;

use config::Environment;
use config::shared::EventConfig;
use martech::connection::{ConnectionResolver, SecretBundleCache, default_secret_name};
use martech::destination::{ClevertapDestination, GamoogaDestination};
use martech::error::ErrorKind;
use martech::test_utils::secrets::CountingSecretsStore;
use serde_json::json;
use telemetry::init_test_tracing;

use crate::support::setup;

fn bundle() -> String {
    json!({
        "clevertap_default": {
            "login": "ACC-1",
            "password": "passcode"
        },
        "gamooga_default": {
            "host": "evbk.gamooga.com",
            "login": "company-7",
            "password": "s3cret",
            "port": "8443"
        }
    })
    .to_string()
}

#[tokio::test]
async fn adapters_share_one_bundle_fetch() {
    init_test_tracing();
    let store = CountingSecretsStore::new();
    let secret_name = default_secret_name(Environment::Prod);
    store.insert(secret_name, bundle()).await;
    let cache = SecretBundleCache::new();
    let resolver = ConnectionResolver::new(Arc::new(store.clone()), secret_name, cache.clone());

    let setup = setup();
    let clevertap =
        ClevertapDestination::open(&resolver, "clevertap_default", EventConfig::default(), &setup)
            .await;
    let gamooga =
        GamoogaDestination::open(&resolver, "gamooga_default", Default::default(), &setup).await;

    assert!(clevertap.is_ok());
    assert!(gamooga.is_ok());
    assert_eq!(store.calls(), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn missing_connection_fails_the_open() {
    init_test_tracing();
    let store = CountingSecretsStore::new();
    store.insert("martech_dev", bundle()).await;
    let resolver = ConnectionResolver::new(Arc::new(store), "martech_dev", SecretBundleCache::new());

    let result =
        GamoogaDestination::open(&resolver, "gamooga_eu", Default::default(), &setup()).await;

    assert_eq!(
        result.err().map(|err| err.kind()),
        Some(ErrorKind::ConnectionNotFound)
    );
}

#[tokio::test]
async fn missing_bundle_is_a_secret_error() {
    init_test_tracing();
    let store = CountingSecretsStore::new();
    let resolver = ConnectionResolver::new(Arc::new(store), "martech", SecretBundleCache::new());

    let err = resolver.resolve("clevertap_default").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SecretNotFound);
}
