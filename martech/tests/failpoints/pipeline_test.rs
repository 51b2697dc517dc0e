use std::sync::Arc;
use std::time::Duration;

use config::shared::{BatchConfig, EventConfig, FailurePolicy, IdentityFields, TransformConfig};
use martech::connection::{ConnectionResolver, SecretBundleCache};
use martech::delivery::{ReqwestTransport, RetryPolicy};
use martech::destination::{ClevertapDestination, DeliverySetup, Destination, MemoryDestination};
use martech::error::ErrorKind;
use martech::pipeline::SyncPipeline;
use martech::secrets::MemorySecretsStore;
use martech::source::InlineSource;
use martech::test_utils::failpoints::CustomFailScenario;
use martech::test_utils::fixtures::records;
use martech::transform::{RecordTransformer, TransformRegistry};
use martech::{DELIVERY_CLIENT__BEFORE_ATTEMPT, SYNC_PIPELINE__BEFORE_BATCH};
use serde_json::json;
use telemetry::init_test_tracing;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pipeline<D>(destination: D, failure_policy: FailurePolicy) -> SyncPipeline<D>
where
    D: Destination + Send + Sync,
{
    let transform = TransformConfig {
        identity_fields: IdentityFields::Single("customer_id".into()),
        ..TransformConfig::default()
    };
    let transformer =
        RecordTransformer::new(&transform, &TransformRegistry::with_builtins()).unwrap();
    let batch = BatchConfig {
        max_records: Some(1),
        ..BatchConfig::default()
    };

    SyncPipeline::new(destination, transformer, batch, failure_policy)
}

fn source(count: usize) -> InlineSource {
    InlineSource::new(
        records((1..=count).map(|id| json!({"customer_id": id})).collect()),
        100,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failed_batch_does_not_stop_a_continue_run() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SYNC_PIPELINE__BEFORE_BATCH, "1*return(rejected)")]);

    let destination = MemoryDestination::new();
    let pipeline = pipeline(destination.clone(), FailurePolicy::Continue);

    let report = pipeline.upload_profiles(&mut source(3)).await.unwrap();

    assert_eq!(report.counters.batches_failed, 1);
    assert_eq!(report.counters.batches_succeeded, 2);
    assert_eq!(
        report.outcomes[0].error_kind(),
        Some(ErrorKind::DestinationRejected)
    );
    assert_eq!(destination.writes().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failed_batch_ends_a_fail_fast_run() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SYNC_PIPELINE__BEFORE_BATCH, "1*off->1*return")]);

    let destination = MemoryDestination::new();
    let pipeline = pipeline(destination.clone(), FailurePolicy::FailFast);

    let err = pipeline.upload_profiles(&mut source(3)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeliveryError);
    assert_eq!(destination.writes().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_attempt_failures_are_retried() {
    init_test_tracing();
    let _scenario =
        CustomFailScenario::setup(&[(DELIVERY_CLIENT__BEFORE_ATTEMPT, "2*return(transient)")]);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemorySecretsStore::new();
    store
        .insert(
            "martech_dev",
            json!({"clevertap_default": {"host": server.uri(), "login": "ACC-1", "password": "p"}})
                .to_string(),
        )
        .await;
    let resolver =
        ConnectionResolver::new(Arc::new(store), "martech_dev", SecretBundleCache::new());
    let setup = DeliverySetup::new(
        Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap()),
        RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20), 2.0),
    );
    let destination =
        ClevertapDestination::open(&resolver, "clevertap_default", EventConfig::default(), &setup)
            .await
            .unwrap();

    let report = pipeline(destination, FailurePolicy::Continue)
        .upload_profiles(&mut source(1))
        .await
        .unwrap();

    assert!(!report.had_failures());
    assert_eq!(report.counters.total_sent, 1);
}
