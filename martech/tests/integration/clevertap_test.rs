use config::shared::EventConfig;
use martech::destination::ClevertapDestination;
use martech::error::ErrorKind;
use martech::source::InlineSource;
use serde_json::{Value, json};
use telemetry::init_test_tracing;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{identity_by, pipeline, records, resolver, setup};

async fn destination(server: &MockServer, event: EventConfig) -> ClevertapDestination {
    let resolver = resolver(json!({
        "clevertap_default": {
            "host": server.uri(),
            "login": "ACC-1",
            "password": "passcode",
            "extra": {"delete_host": server.uri()}
        }
    }))
    .await;

    ClevertapDestination::open(&resolver, "clevertap_default", event, &setup())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn profiles_are_uploaded_in_clevertap_envelopes() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/upload"))
        .and(header("X-CleverTap-Account-Id", "ACC-1"))
        .and(header("X-CleverTap-Passcode", "passcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "processed": 2,
            "unprocessed": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(
        destination(&server, EventConfig::default()).await,
        identity_by("customer_id"),
    );
    let mut source = InlineSource::new(
        records(vec![
            json!({"customer_id": 1, "Name": "Asha"}),
            json!({"customer_id": 2, "Name": "Ravi"}),
            json!({"Name": "no identity"}),
        ]),
        100,
    );

    let report = pipeline.upload_profiles(&mut source).await.unwrap();

    assert_eq!(report.counters.total_sent, 2);
    assert_eq!(report.counters.total_invalid, 1);
    assert_eq!(report.outcomes[0].http_status, Some(200));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["d"][0],
        json!({
            "type": "profile",
            "identity": 1,
            "profileData": {"customer_id": 1, "Name": "Asha"}
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_send_the_identity_list() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/delete/profiles.json"))
        .and(body_json(json!({"identity": ["a@example.com", "b@example.com"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(
        destination(&server, EventConfig::default()).await,
        identity_by("email"),
    );
    let mut source = InlineSource::new(
        records(vec![
            json!({"email": "a@example.com"}),
            json!({"email": "b@example.com"}),
        ]),
        100,
    );

    let report = pipeline.delete_profiles(&mut source).await.unwrap();

    assert!(!report.had_failures());
    assert_eq!(report.counters.total_sent, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_deletes_are_reported_as_failures() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/delete/profiles.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "unprocessed": ["b@example.com"]
        })))
        .mount(&server)
        .await;

    let pipeline = pipeline(
        destination(&server, EventConfig::default()).await,
        identity_by("email"),
    );
    let mut source = InlineSource::new(
        records(vec![
            json!({"email": "a@example.com"}),
            json!({"email": "b@example.com"}),
        ]),
        100,
    );

    let report = pipeline.delete_profiles(&mut source).await.unwrap();

    assert!(report.had_failures());
    assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::DeliveryError));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_not_retried() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/upload"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(
        destination(
            &server,
            EventConfig {
                event_name: Some("Order Placed".into()),
                ..EventConfig::default()
            },
        )
        .await,
        identity_by("customer_id"),
    );
    let mut source = InlineSource::new(records(vec![json!({"customer_id": 9, "amount": 120})]), 10);

    let report = pipeline.upload_events(&mut source).await.unwrap();

    assert_eq!(report.counters.total_failed, 1);
    assert_eq!(report.outcomes[0].http_status, Some(503));
    assert_eq!(
        report.outcomes[0].error_kind(),
        Some(ErrorKind::DestinationRejected)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_destination_exhausts_retries() {
    init_test_tracing();
    let resolver = resolver(json!({
        "clevertap_default": {
            "host": "http://127.0.0.1:1",
            "login": "ACC-1",
            "password": "passcode"
        }
    }))
    .await;
    let destination = ClevertapDestination::open(
        &resolver,
        "clevertap_default",
        EventConfig::default(),
        &setup(),
    )
    .await
    .unwrap();

    let pipeline = pipeline(destination, identity_by("customer_id"));
    let mut source = InlineSource::new(records(vec![json!({"customer_id": 1})]), 10);

    let report = pipeline.upload_profiles(&mut source).await.unwrap();

    assert!(report.had_failures());
    assert_eq!(report.outcomes[0].http_status, None);
    assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::DeliveryError));
}
