use bytes::Bytes;
use config::shared::EventConfig;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::batching::{BatchEncoder, FieldListEncoder, JsonArrayEncoder};
use crate::connection::{Connection, ConnectionResolver};
use crate::delivery::{DeliveryClient, HttpRequest};
use crate::destination::base::json_body;
use crate::destination::{DeliveryResponse, DeliverySetup, Destination, RunContext};
use crate::error::{ErrorKind, MartechResult};
use crate::types::{Batch, Operation, Record, TransformedRecord};
use crate::{bail, martech_error};

/// Default upload api of CleverTap, replaced by the connection host.
pub const CLEVERTAP_BASE_URL: &str = "https://api.clevertap.com";

/// Default profile deletion api of CleverTap, replaced by `extra.delete_host`.
pub const CLEVERTAP_DELETE_BASE_URL: &str = "https://in1.api.clevertap.com";

const ACCOUNT_ID_HEADER: &str = "X-CleverTap-Account-Id";
const PASSCODE_HEADER: &str = "X-CleverTap-Passcode";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const UPLOAD_ENDPOINT: &str = "1/upload";
const DELETE_ENDPOINT: &str = "1/delete/profiles.json";

const UPLOAD_ENCODER: JsonArrayEncoder = JsonArrayEncoder::wrapped("d");
const DELETE_ENCODER: FieldListEncoder = FieldListEncoder::new("identity", "identity");

/// CleverTap profile upload, event upload and profile deletion.
///
/// Profiles are sent as `{"d": [{"type": "profile", "identity", "profileData"}]}`, events as
/// `{"d": [{"type": "event", "identity", "evtName", "evtData"}]}` and deletions as
/// `{"identity": [..]}`.
#[derive(Clone)]
pub struct ClevertapDestination {
    client: DeliveryClient,
    delete_client: DeliveryClient,
    account_id: String,
    passcode: String,
    event: EventConfig,
}

impl ClevertapDestination {
    /// Resolves `connection_id` and prepares the upload and delete clients.
    ///
    /// The connection login is the account id and its password the passcode.
    pub async fn open(
        resolver: &ConnectionResolver,
        connection_id: &str,
        event: EventConfig,
        setup: &DeliverySetup,
    ) -> MartechResult<Self> {
        let connection = resolver.resolve(connection_id).await?;
        Self::from_connection(&connection, event, setup)
    }

    pub fn from_connection(
        connection: &Connection,
        event: EventConfig,
        setup: &DeliverySetup,
    ) -> MartechResult<Self> {
        let base_url = connection.base_url(CLEVERTAP_BASE_URL)?;
        let delete_url = match connection.extra_str("delete_host") {
            Some(host) if host.contains("://") => Url::parse(host)?,
            Some(host) => Url::parse(&format!("https://{host}"))?,
            None => Url::parse(CLEVERTAP_DELETE_BASE_URL)?,
        };

        info!(
            connection_id = %connection.id,
            base_url = %base_url,
            delete_url = %delete_url,
            "opened clevertap destination"
        );

        Ok(Self {
            client: setup.client(base_url),
            delete_client: setup.client(delete_url),
            account_id: connection.require_login()?.to_owned(),
            passcode: connection.require_password()?.to_owned(),
            event,
        })
    }

    fn request(&self, endpoint: &str, payload: Vec<u8>) -> HttpRequest {
        HttpRequest::post(endpoint)
            .header(ACCOUNT_ID_HEADER, self.account_id.clone())
            .header(PASSCODE_HEADER, self.passcode.clone())
            .bytes(JSON_CONTENT_TYPE, Bytes::from(payload))
    }

    fn event_name(&self, data: &mut Record) -> MartechResult<String> {
        if let Some(field) = &self.event.event_name_field
            && let Some(value) = data.shift_remove(field)
        {
            match value {
                Value::String(name) if !name.is_empty() => return Ok(name),
                Value::String(_) | Value::Null => {}
                other => return Ok(other.to_string()),
            }
        }

        match &self.event.event_name {
            Some(name) => Ok(name.clone()),
            None => bail!(
                ErrorKind::InvalidData,
                "Event record has no event name",
                "set `event_name` or `event_name_field` on the clevertap destination"
            ),
        }
    }
}

impl Destination for ClevertapDestination {
    fn name() -> &'static str {
        "clevertap"
    }

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    fn prepare(&self, operation: Operation) -> MartechResult<()> {
        if operation == Operation::UploadEvents
            && self.event.event_name.is_none()
            && self.event.event_name_field.is_none()
        {
            bail!(
                ErrorKind::ConfigError,
                "CleverTap events need an event name",
                "set `event_name` or `event_name_field` on the clevertap destination"
            );
        }

        Ok(())
    }

    fn envelope(&self, operation: Operation, record: TransformedRecord) -> MartechResult<Record> {
        let TransformedRecord { identity, mut data } = record;
        let mut enveloped = Record::with_capacity(5);

        match operation {
            Operation::UploadProfiles => {
                enveloped.insert("type".to_owned(), Value::from("profile"));
                enveloped.insert("identity".to_owned(), identity);
                enveloped.insert("profileData".to_owned(), Value::Object(data));
            }
            Operation::UploadEvents => {
                let event_name = self.event_name(&mut data)?;
                let timestamp = match &self.event.timestamp_field {
                    Some(field) => data.shift_remove(field).filter(|ts| !ts.is_null()),
                    None => None,
                };

                enveloped.insert("type".to_owned(), Value::from("event"));
                enveloped.insert("identity".to_owned(), identity);
                if let Some(ts) = timestamp {
                    enveloped.insert("ts".to_owned(), ts);
                }
                enveloped.insert("evtName".to_owned(), Value::from(event_name));
                enveloped.insert("evtData".to_owned(), Value::Object(data));
            }
            Operation::DeleteProfiles => {
                enveloped.insert("identity".to_owned(), identity);
            }
        }

        Ok(enveloped)
    }

    fn encoder(&self, operation: Operation) -> &dyn BatchEncoder {
        match operation {
            Operation::UploadProfiles | Operation::UploadEvents => &UPLOAD_ENCODER,
            Operation::DeleteProfiles => &DELETE_ENCODER,
        }
    }

    async fn write_batch(
        &self,
        operation: Operation,
        batch: &Batch,
        _context: &RunContext,
    ) -> MartechResult<DeliveryResponse> {
        let payload = self.encoder(operation).encode(&batch.records)?;

        let response = match operation {
            Operation::UploadProfiles | Operation::UploadEvents => {
                self.client
                    .send(self.request(UPLOAD_ENDPOINT, payload))
                    .await?
            }
            Operation::DeleteProfiles => {
                self.delete_client
                    .send(self.request(DELETE_ENDPOINT, payload))
                    .await?
            }
        };

        let body = match json_body(Self::name(), &response) {
            Ok(body) => body,
            Err(rejected) => return Ok(rejected),
        };

        Ok(classify_body(operation, batch, response.status, body))
    }
}

/// Interprets a CleverTap JSON answer.
///
/// The call succeeded only when `status` is `success`. Unprocessed records fail a deletion as a
/// partial delete and are counted as rejected on uploads.
fn classify_body(operation: Operation, batch: &Batch, status: u16, body: Value) -> DeliveryResponse {
    let Some(object) = body.as_object() else {
        return DeliveryResponse::rejected(
            Some(status),
            Some(body.clone()),
            martech_error!(
                ErrorKind::MalformedResponse,
                "CleverTap answered with a non object body",
                body.to_string()
            ),
        );
    };

    if object.get("status").and_then(Value::as_str) != Some("success") {
        let error = martech_error!(
            ErrorKind::DestinationRejected,
            "CleverTap did not report success",
            body.to_string()
        );
        return DeliveryResponse::rejected(Some(status), Some(body), error);
    }

    let unprocessed = object
        .get("unprocessed")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    if unprocessed > 0 {
        if operation == Operation::DeleteProfiles {
            let error = martech_error!(
                ErrorKind::DeliveryError,
                "CleverTap deleted only part of the profiles",
                format!("{unprocessed} of {} identities unprocessed", batch.len())
            );
            return DeliveryResponse::rejected(Some(status), Some(body), error);
        }

        warn!(
            batch_index = batch.index,
            unprocessed,
            records = batch.len(),
            "clevertap did not process every record of the batch"
        );
    }

    DeliveryResponse::accepted(Some(status), Some(body), unprocessed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::delivery::RetryPolicy;
    use crate::test_utils::fixtures::connection;
    use crate::test_utils::transport::{ScriptedReply, ScriptedTransport};

    fn destination(transport: &ScriptedTransport, event: EventConfig) -> ClevertapDestination {
        let connection = connection(
            "clevertap_default",
            json!({"login": "ACC-1", "password": "pass"}),
        );
        let setup = DeliverySetup::new(Arc::new(transport.clone()), RetryPolicy::no_retry());
        ClevertapDestination::from_connection(&connection, event, &setup).unwrap()
    }

    fn transformed(identity: Value, data: Value) -> TransformedRecord {
        TransformedRecord {
            identity,
            data: data.as_object().cloned().unwrap(),
        }
    }

    fn batch(records: Vec<Record>) -> Batch {
        Batch {
            index: 0,
            size_bytes: 0,
            records,
        }
    }

    #[test]
    fn profile_and_event_envelopes() {
        let transport = ScriptedTransport::new();
        let destination = destination(
            &transport,
            EventConfig {
                event_name: Some("Purchased".into()),
                event_name_field: None,
                timestamp_field: Some("ts".into()),
            },
        );

        let profile = destination
            .envelope(
                Operation::UploadProfiles,
                transformed(json!("u-1"), json!({"Name": "Asha"})),
            )
            .unwrap();
        let event = destination
            .envelope(
                Operation::UploadEvents,
                transformed(json!("u-1"), json!({"amount": 10, "ts": 1700000000})),
            )
            .unwrap();

        assert_eq!(
            Value::Object(profile),
            json!({"type": "profile", "identity": "u-1", "profileData": {"Name": "Asha"}})
        );
        assert_eq!(
            Value::Object(event),
            json!({
                "type": "event",
                "identity": "u-1",
                "ts": 1700000000,
                "evtName": "Purchased",
                "evtData": {"amount": 10}
            })
        );
    }

    #[test]
    fn events_without_a_name_are_rejected_up_front() {
        let destination = destination(&ScriptedTransport::new(), EventConfig::default());

        let err = destination.prepare(Operation::UploadEvents).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert!(destination.prepare(Operation::UploadProfiles).is_ok());
    }

    #[tokio::test]
    async fn uploads_carry_account_headers() {
        let transport = ScriptedTransport::new();
        transport.push(ScriptedReply::Status(
            200,
            r#"{"status":"success","processed":1,"unprocessed":[]}"#.into(),
        ));
        let destination = destination(&transport, EventConfig::default());
        let record = destination
            .envelope(
                Operation::UploadProfiles,
                transformed(json!(1), json!({"City": "Pune"})),
            )
            .unwrap();

        let response = destination
            .write_batch(
                Operation::UploadProfiles,
                &batch(vec![record]),
                &RunContext::start(),
            )
            .await
            .unwrap();

        assert!(response.is_accepted());
        let (url, request) = transport.requests().pop().unwrap();
        assert_eq!(url.as_str(), "https://api.clevertap.com/1/upload");
        assert_eq!(request.header_value("x-clevertap-account-id"), Some("ACC-1"));
        assert_eq!(request.header_value("X-CleverTap-Passcode"), Some("pass"));
    }

    #[tokio::test]
    async fn partial_deletes_fail_the_batch() {
        let transport = ScriptedTransport::new();
        transport.push(ScriptedReply::Status(
            200,
            r#"{"status":"success","unprocessed":[{"identity":"u-2"}]}"#.into(),
        ));
        let destination = destination(&transport, EventConfig::default());
        let records = ["u-1", "u-2"]
            .into_iter()
            .map(|id| {
                destination
                    .envelope(
                        Operation::DeleteProfiles,
                        transformed(json!(id), json!({})),
                    )
                    .unwrap()
            })
            .collect();

        let response = destination
            .write_batch(
                Operation::DeleteProfiles,
                &batch(records),
                &RunContext::start(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.error.map(|err| err.kind()),
            Some(ErrorKind::DeliveryError)
        );
        let (url, _) = transport.requests().pop().unwrap();
        assert_eq!(
            url.as_str(),
            "https://in1.api.clevertap.com/1/delete/profiles.json"
        );
    }

    #[tokio::test]
    async fn unprocessed_uploads_are_counted() {
        let transport = ScriptedTransport::new();
        transport.push(ScriptedReply::Status(
            200,
            r#"{"status":"success","processed":1,"unprocessed":[{"status":"fail"}]}"#.into(),
        ));
        let destination = destination(&transport, EventConfig::default());

        let response = destination
            .write_batch(
                Operation::UploadProfiles,
                &batch(vec![Record::new(), Record::new()]),
                &RunContext::start(),
            )
            .await
            .unwrap();

        assert!(response.is_accepted());
        assert_eq!(response.rejected_records, 1);
    }

    #[tokio::test]
    async fn failed_status_is_a_rejection() {
        let transport = ScriptedTransport::new();
        transport.push(ScriptedReply::Status(
            200,
            r#"{"status":"fail","error":"Invalid passcode"}"#.into(),
        ));
        let destination = destination(&transport, EventConfig::default());

        let response = destination
            .write_batch(
                Operation::UploadProfiles,
                &batch(vec![Record::new()]),
                &RunContext::start(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.error.map(|err| err.kind()),
            Some(ErrorKind::DestinationRejected)
        );
    }
}
