use std::sync::Arc;

use config::shared::DestinationConfig;
use martech::destination::NetcoreDestination;
use martech::error::ErrorKind;
use martech::source::InlineSource;
use martech::storage::{MemoryObjectStore, ObjectStore};
use serde_json::json;
use telemetry::init_test_tracing;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{identity_by, pipeline, records, resolver, setup};

async fn destination(
    server: &MockServer,
    store: Option<Arc<dyn ObjectStore>>,
) -> NetcoreDestination {
    let resolver = resolver(json!({
        "netcore_default": {
            "host": server.uri(),
            "extra": {
                "api_key": "key-1",
                "activity_api_key": "act-1",
                "ip_whitelisted_bucket": "netcore-staging",
                "listid": "7"
            }
        }
    }))
    .await;

    NetcoreDestination::open(
        &resolver,
        "netcore_default",
        DestinationConfig::DEFAULT_STAGING_REGION,
        DestinationConfig::DEFAULT_STAGING_PREFIX,
        store,
        &setup(),
    )
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn contacts_are_staged_and_announced() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apiv2"))
        .and(query_param("type", "contact"))
        .and(query_param("activity", "bulkupload"))
        .and(query_param("apikey", "key-1"))
        .and(query_param("notifyemail", "marketing.tech@nykaa.com"))
        .and(body_string_contains("listid=7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = pipeline(
        destination(&server, Some(store.clone() as Arc<dyn ObjectStore>)).await,
        identity_by("email"),
    );
    let mut source = InlineSource::new(
        records(vec![
            json!({"email": "a@example.com", "city": "Pune"}),
            json!({"email": "b@example.com", "city": "Goa"}),
        ]),
        100,
    );

    let report = pipeline.upload_profiles(&mut source).await.unwrap();

    assert_eq!(report.counters.total_sent, 2);
    let objects = store.objects().await;
    assert_eq!(objects.len(), 1);
    let (bucket, key) = &objects[0];
    assert_eq!(bucket, "netcore-staging");
    assert!(key.starts_with("netcore_prive_data/netcore_default_user_profile_"));
    assert!(key.ends_with("_part_0.csv"));

    let staged = store.get(bucket, key).await.unwrap().unwrap();
    assert_eq!(
        staged.as_ref(),
        b"email,city\na@example.com,Pune\nb@example.com,Goa\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn contact_upload_without_staging_store_fails_before_reading() {
    init_test_tracing();
    let server = MockServer::start().await;

    let pipeline = pipeline(destination(&server, None).await, identity_by("email"));
    let mut source = InlineSource::new(records(vec![json!({"email": "a@example.com"})]), 10);

    let err = pipeline.upload_profiles(&mut source).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn activities_with_non_json_answers_fail() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/activity/batchactivity/act-1"))
        .and(body_string_contains("filename=\"netcore.csv\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("Accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(destination(&server, None).await, identity_by("email"));
    let mut source = InlineSource::new(
        records(vec![json!({"email": "a@example.com", "activity": "cart"})]),
        10,
    );

    let report = pipeline.upload_events(&mut source).await.unwrap();

    assert!(report.had_failures());
    assert_eq!(
        report.outcomes[0].error_kind(),
        Some(ErrorKind::MalformedResponse)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_are_not_supported() {
    init_test_tracing();
    let server = MockServer::start().await;

    let pipeline = pipeline(destination(&server, None).await, identity_by("email"));
    let mut source = InlineSource::new(records(vec![json!({"email": "a@example.com"})]), 10);

    let err = pipeline.delete_profiles(&mut source).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
