use std::sync::Arc;

use bytes::Bytes;
use config::shared::SourceConfig;
use martech::destination::MemoryDestination;
use martech::error::ErrorKind;
use martech::source::{ist_now, open_source, render_key_template};
use martech::storage::{MemoryObjectStore, ObjectStore};
use serde_json::json;
use telemetry::init_test_tracing;

use crate::support::{identity_by, pipeline};

#[tokio::test]
async fn csv_exports_feed_a_run() {
    init_test_tracing();
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let key = render_key_template("exports/{today}/profiles.csv", ist_now());
    store
        .put(
            "martech-exports",
            &key,
            Bytes::from_static(b"customer_id,email,points\n1,a@example.com,10\n,b@example.com,NA\n3,,2.5\n"),
        )
        .await
        .unwrap();

    let config = SourceConfig::ObjectStore {
        bucket: "martech-exports".into(),
        key: "exports/{today}/profiles.csv".into(),
    };
    let mut source = open_source(&config, Some(store), 2).await.unwrap();
    let destination = MemoryDestination::new();
    let pipeline = pipeline(destination.clone(), identity_by("customer_id"));

    let report = pipeline.upload_profiles(source.as_mut()).await.unwrap();

    assert_eq!(report.counters.total_processed, 3);
    assert_eq!(report.counters.total_invalid, 1);
    let records = destination.records().await;
    assert_eq!(records[0]["points"], json!(10));
    assert_eq!(records[1]["points"], json!(2.5));
    assert_eq!(records[1]["email"], json!(null));
}

#[tokio::test]
async fn object_store_source_needs_a_store() {
    let config = SourceConfig::ObjectStore {
        bucket: "martech-exports".into(),
        key: "profiles.csv".into(),
    };

    let err = open_source(&config, None, 10).await.err().unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test]
async fn missing_export_gives_an_empty_run() {
    init_test_tracing();
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let config = SourceConfig::ObjectStore {
        bucket: "martech-exports".into(),
        key: "exports/{yesterday}.csv".into(),
    };
    let mut source = open_source(&config, Some(store), 10).await.unwrap();
    let pipeline = pipeline(MemoryDestination::new(), identity_by("customer_id"));

    let report = pipeline.upload_profiles(source.as_mut()).await.unwrap();

    assert_eq!(report.counters.total_processed, 0);
    assert!(report.outcomes.is_empty());
}
