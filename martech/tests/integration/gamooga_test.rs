use martech::destination::{GAMOOGA_MAX_BATCH_RECORDS, GamoogaDestination};
use martech::source::InlineSource;
use serde_json::{Value, json};
use telemetry::init_test_tracing;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{identity_by, pipeline, records, resolver, setup};

async fn destination(server: &MockServer) -> GamoogaDestination {
    let resolver = resolver(json!({
        "gamooga_default": {
            "host": server.uri(),
            "login": "company-7",
            "password": "s3cret"
        }
    }))
    .await;

    GamoogaDestination::open(
        &resolver,
        "gamooga_default",
        [("age".to_owned(), "int".to_owned())].into(),
        &setup(),
    )
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn properties_are_capped_per_call() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bulkvpr/"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(3)
        .mount(&server)
        .await;

    let pipeline = pipeline(destination(&server).await, identity_by("vid"));
    let values = (0..2500)
        .map(|i| json!({"vid": format!("v-{i}"), "age": 20 + i % 50}))
        .collect();
    let mut source = InlineSource::new(records(values), 5000);

    let report = pipeline.upload_profiles(&mut source).await.unwrap();

    let sizes: Vec<usize> = report.outcomes.iter().map(|o| o.record_count).collect();
    assert_eq!(
        sizes,
        vec![GAMOOGA_MAX_BATCH_RECORDS, GAMOOGA_MAX_BATCH_RECORDS, 500]
    );
    assert_eq!(report.counters.total_sent, 2500);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["c"], json!("company-7"));
    assert_eq!(body["prop_types"], json!({"age": "int"}));
    assert_eq!(body["props"][0], json!({"vid": "v-0", "age": 20}));
}

#[tokio::test(flavor = "multi_thread")]
async fn events_are_sent_as_signed_tokens() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bev/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(destination(&server).await, identity_by("vid"));
    let mut source = InlineSource::new(records(vec![json!({"vid": "v-1", "ev": "purchase"})]), 10);

    let report = pipeline.upload_events(&mut source).await.unwrap();

    assert!(!report.had_failures());
    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["c"], json!("company-7"));
    assert_eq!(body["jwt"].as_str().map(|jwt| jwt.split('.').count()), Some(3));
}
