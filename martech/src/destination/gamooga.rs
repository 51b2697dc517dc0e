use bytes::Bytes;
use indexmap::IndexMap;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::info;

use crate::batching::{BatchEncoder, JsonArrayEncoder};
use crate::connection::{Connection, ConnectionResolver};
use crate::delivery::{DeliveryClient, HttpRequest};
use crate::destination::base::check_status;
use crate::destination::{DeliveryResponse, DeliverySetup, Destination, RunContext};
use crate::error::{ErrorKind, MartechResult};
use crate::types::{Batch, Operation, Record, TransformedRecord};
use crate::{bail, martech_error};

/// Largest number of visitors or events Gamooga accepts in one call.
pub const GAMOOGA_MAX_BATCH_RECORDS: usize = 1000;

const PROPERTIES_ENDPOINT: &str = "bulkvpr/";
const EVENTS_ENDPOINT: &str = "bev/";
const PROPERTIES_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const PROPERTIES_ENCODER: JsonArrayEncoder = JsonArrayEncoder::wrapped("props");
const EVENTS_ENCODER: JsonArrayEncoder = JsonArrayEncoder::wrapped("payload");

/// Gamooga bulk visitor property and event upload.
///
/// Events are signed: the batch is sent as an HS256 token of `{"payload": [..]}` keyed with the
/// company secret.
#[derive(Clone)]
pub struct GamoogaDestination {
    client: DeliveryClient,
    company_id: String,
    secret_key: SecretString,
    property_types: IndexMap<String, String>,
}

impl GamoogaDestination {
    /// Resolves `connection_id` and prepares the api client.
    ///
    /// The company id is `extra.company_id` or the login, the secret `extra.secret_key` or the
    /// password.
    pub async fn open(
        resolver: &ConnectionResolver,
        connection_id: &str,
        property_types: IndexMap<String, String>,
        setup: &DeliverySetup,
    ) -> MartechResult<Self> {
        let connection = resolver.resolve(connection_id).await?;
        Self::from_connection(&connection, property_types, setup)
    }

    pub fn from_connection(
        connection: &Connection,
        property_types: IndexMap<String, String>,
        setup: &DeliverySetup,
    ) -> MartechResult<Self> {
        let Some(host) = connection.host.as_deref() else {
            bail!(
                ErrorKind::ConfigError,
                "Gamooga connection has no host",
                connection.id.clone()
            );
        };
        let base_url = connection.base_url(host)?;

        let company_id = match connection.extra_str("company_id") {
            Some(company_id) => company_id.to_owned(),
            None => connection.require_login()?.to_owned(),
        };
        let secret_key = match connection.extra_str("secret_key") {
            Some(secret_key) => secret_key.to_owned(),
            None => connection.require_password()?.to_owned(),
        };

        info!(connection_id = %connection.id, base_url = %base_url, "opened gamooga destination");

        Ok(Self {
            client: setup.client(base_url),
            company_id,
            secret_key: SecretString::new(secret_key),
            property_types,
        })
    }

    /// Signs `events` into the token sent to the event api.
    ///
    /// An empty list gives an empty token.
    pub fn sign_events(&self, events: &[Record]) -> MartechResult<String> {
        if events.is_empty() {
            return Ok(String::new());
        }

        let claims = json!({ "payload": events });
        let key = EncodingKey::from_secret(self.secret_key.expose_secret().as_bytes());

        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &key,
        )?)
    }

    fn properties_request(&self, batch: &Batch) -> MartechResult<HttpRequest> {
        let body = json!({
            "props": batch.records,
            "c": self.company_id,
            "prop_types": self.property_types,
        });

        Ok(HttpRequest::post(PROPERTIES_ENDPOINT)
            .bytes(PROPERTIES_CONTENT_TYPE, Bytes::from(serde_json::to_vec(&body)?)))
    }

    fn events_request(&self, batch: &Batch) -> MartechResult<HttpRequest> {
        let body = json!({
            "jwt": self.sign_events(&batch.records)?,
            "c": self.company_id,
        });

        Ok(HttpRequest::post(EVENTS_ENDPOINT).json(body))
    }
}

impl Destination for GamoogaDestination {
    fn name() -> &'static str {
        "gamooga"
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(
            operation,
            Operation::UploadProfiles | Operation::UploadEvents
        )
    }

    fn envelope(&self, _operation: Operation, record: TransformedRecord) -> MartechResult<Record> {
        Ok(record.data)
    }

    fn encoder(&self, operation: Operation) -> &dyn BatchEncoder {
        match operation {
            Operation::UploadEvents => &EVENTS_ENCODER,
            Operation::UploadProfiles | Operation::DeleteProfiles => &PROPERTIES_ENCODER,
        }
    }

    fn max_batch_records(&self, _operation: Operation) -> Option<usize> {
        Some(GAMOOGA_MAX_BATCH_RECORDS)
    }

    async fn write_batch(
        &self,
        operation: Operation,
        batch: &Batch,
        _context: &RunContext,
    ) -> MartechResult<DeliveryResponse> {
        let request = match operation {
            Operation::UploadProfiles => self.properties_request(batch)?,
            Operation::UploadEvents => self.events_request(batch)?,
            Operation::DeleteProfiles => {
                return Err(martech_error!(
                    ErrorKind::ConfigError,
                    "Gamooga does not support profile deletion"
                ));
            }
        };

        let response = self.client.send(request).await?;
        if let Err(rejected) = check_status(Self::name(), &response) {
            return Ok(rejected);
        }

        Ok(DeliveryResponse::accepted(
            Some(response.status),
            response.json().ok(),
            0,
        ))
    }
}
