use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::batching::{BatchEncoder, CsvEncoder};
use crate::connection::{Connection, ConnectionResolver};
use crate::delivery::{DeliveryClient, HttpRequest, HttpResponse, MultipartPart};
use crate::destination::base::json_body;
use crate::destination::{DeliveryResponse, DeliverySetup, Destination, RunContext};
use crate::error::{ErrorKind, MartechResult};
use crate::metrics::FILE_STAGED_MESSAGE;
use crate::storage::{ObjectLocation, ObjectStore};
use crate::types::{Batch, Operation, Record, TransformedRecord, value_to_cell};
use crate::{bail, egress_info};

/// Default api of Netcore Smartech, replaced by the connection host.
pub const NETCORE_BASE_URL: &str = "http://api.netcoresmartech.com";

/// Address notified by Netcore once a bulk contact upload is processed.
pub const DEFAULT_NOTIFY_EMAIL: &str = "marketing.tech@nykaa.com";

const CONTACT_UPLOAD_ENDPOINT: &str = "apiv2";
const ACTIVITY_ENDPOINT: &str = "v1/activity/batchactivity";
const ACTIVITY_FILE_PART: &str = "data";
const ACTIVITY_FILE_NAME: &str = "netcore.csv";

const ENCODER: CsvEncoder = CsvEncoder::new();

/// Settings read from the `extra` field of a Netcore connection.
#[derive(Debug, Clone)]
struct NetcoreSettings {
    api_key: Option<String>,
    activity_api_key: Option<String>,
    notify_email: String,
    bucket: Option<String>,
    list_id: Option<String>,
}

impl NetcoreSettings {
    fn from_connection(connection: &Connection) -> Self {
        Self {
            api_key: connection.extra_str("api_key").map(str::to_owned),
            activity_api_key: connection.extra_str("activity_api_key").map(str::to_owned),
            notify_email: connection
                .extra_str("notifyemail")
                .unwrap_or(DEFAULT_NOTIFY_EMAIL)
                .to_owned(),
            bucket: connection
                .extra_str("ip_whitelisted_bucket")
                .map(str::to_owned),
            list_id: connection
                .extra
                .get("listid")
                .filter(|list_id| !list_id.is_null())
                .map(value_to_cell),
        }
    }
}

/// Netcore Smartech bulk contact upload and batch activity upload.
///
/// Contacts are pulled by Netcore: every batch is written as a CSV file to a whitelisted bucket
/// and its public url is handed to the bulk upload api. Activities are posted as CSV files.
#[derive(Clone)]
pub struct NetcoreDestination {
    connection_id: String,
    client: DeliveryClient,
    settings: NetcoreSettings,
    store: Option<Arc<dyn ObjectStore>>,
    staging_region: String,
    staging_prefix: String,
}

impl NetcoreDestination {
    /// Resolves `connection_id` and prepares the api client.
    ///
    /// Contact uploads also need `store`, where batches are staged under `staging_prefix`.
    pub async fn open(
        resolver: &ConnectionResolver,
        connection_id: &str,
        staging_region: impl Into<String>,
        staging_prefix: impl Into<String>,
        store: Option<Arc<dyn ObjectStore>>,
        setup: &DeliverySetup,
    ) -> MartechResult<Self> {
        let connection = resolver.resolve(connection_id).await?;
        Self::from_connection(&connection, staging_region, staging_prefix, store, setup)
    }

    pub fn from_connection(
        connection: &Connection,
        staging_region: impl Into<String>,
        staging_prefix: impl Into<String>,
        store: Option<Arc<dyn ObjectStore>>,
        setup: &DeliverySetup,
    ) -> MartechResult<Self> {
        let base_url = connection.base_url(NETCORE_BASE_URL)?;
        info!(connection_id = %connection.id, base_url = %base_url, "opened netcore destination");

        Ok(Self {
            connection_id: connection.id.clone(),
            client: setup.client(base_url),
            settings: NetcoreSettings::from_connection(connection),
            store,
            staging_region: staging_region.into(),
            staging_prefix: staging_prefix.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Returns where batch `batch_index` of the run is staged.
    ///
    /// Keys only depend on the run and the batch, so staging a batch again overwrites it.
    pub fn staging_location(
        &self,
        bucket: &str,
        context: &RunContext,
        batch_index: usize,
    ) -> ObjectLocation {
        let key = format!(
            "{}/{}_user_profile_{}_{}_part_{batch_index}.csv",
            self.staging_prefix,
            self.connection_id,
            context.run_id.simple(),
            context.started_at.format("%Y-%m-%d"),
        );

        ObjectLocation::new(bucket, key)
    }

    async fn upload_contacts(
        &self,
        batch: &Batch,
        context: &RunContext,
    ) -> MartechResult<DeliveryResponse> {
        let (Some(store), Some(bucket), Some(api_key)) = (
            self.store.as_ref(),
            self.settings.bucket.as_deref(),
            self.settings.api_key.as_deref(),
        ) else {
            bail!(
                ErrorKind::ConfigError,
                "Netcore contact upload is not configured",
                self.connection_id.clone()
            );
        };

        let payload = Bytes::from(ENCODER.encode(&batch.records)?);
        let location = self.staging_location(bucket, context, batch.index);
        let staged_bytes = payload.len();
        store.put(&location.bucket, &location.key, payload).await?;

        egress_info!(
            FILE_STAGED_MESSAGE,
            destination = Self::name(),
            location = %location,
            batch_index = batch.index,
            bytes = staged_bytes,
            records = batch.len()
        );

        let mut form = vec![(
            "path".to_owned(),
            location.public_url(&self.staging_region),
        )];
        if let Some(list_id) = &self.settings.list_id {
            form.push(("listid".to_owned(), list_id.clone()));
        }

        let request = HttpRequest::post(CONTACT_UPLOAD_ENDPOINT)
            .query("type", "contact")
            .query("activity", "bulkupload")
            .query("apikey", api_key)
            .query("notifyemail", self.settings.notify_email.clone())
            .form(form);

        let response = self.client.send(request).await?;
        Ok(accepted_json(&response))
    }

    async fn upload_activities(&self, batch: &Batch) -> MartechResult<DeliveryResponse> {
        let Some(activity_api_key) = self.settings.activity_api_key.as_deref() else {
            bail!(
                ErrorKind::ConfigError,
                "Netcore activity upload is not configured",
                self.connection_id.clone()
            );
        };

        let file = MultipartPart {
            name: ACTIVITY_FILE_PART.to_owned(),
            file_name: Some(ACTIVITY_FILE_NAME.to_owned()),
            content_type: ENCODER.content_type().to_owned(),
            data: Bytes::from(ENCODER.encode(&batch.records)?),
        };
        let request =
            HttpRequest::post(format!("{ACTIVITY_ENDPOINT}/{activity_api_key}")).multipart(vec![file]);

        let response = self.client.send(request).await?;
        Ok(accepted_json(&response))
    }
}

fn accepted_json(response: &HttpResponse) -> DeliveryResponse {
    match json_body(NetcoreDestination::name(), response) {
        Ok(body) => DeliveryResponse::accepted(Some(response.status), Some(body), 0),
        Err(rejected) => rejected,
    }
}

impl Destination for NetcoreDestination {
    fn name() -> &'static str {
        "netcore"
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(
            operation,
            Operation::UploadProfiles | Operation::UploadEvents
        )
    }

    fn prepare(&self, operation: Operation) -> MartechResult<()> {
        match operation {
            Operation::UploadProfiles => {
                if self.store.is_none() {
                    bail!(
                        ErrorKind::ConfigError,
                        "Netcore contact upload needs an object store for staging",
                        "set `aws_connection_id`"
                    );
                }
                if self.settings.bucket.is_none() {
                    bail!(
                        ErrorKind::ConfigError,
                        "Connection is missing a required extra field",
                        format!("{}.extra.ip_whitelisted_bucket", self.connection_id)
                    );
                }
                if self.settings.api_key.is_none() {
                    bail!(
                        ErrorKind::ConfigError,
                        "Connection is missing a required extra field",
                        format!("{}.extra.api_key", self.connection_id)
                    );
                }
            }
            Operation::UploadEvents => {
                if self.settings.activity_api_key.is_none() {
                    bail!(
                        ErrorKind::ConfigError,
                        "Connection is missing a required extra field",
                        format!("{}.extra.activity_api_key", self.connection_id)
                    );
                }
            }
            Operation::DeleteProfiles => {}
        }

        Ok(())
    }

    fn envelope(&self, _operation: Operation, record: TransformedRecord) -> MartechResult<Record> {
        Ok(record.data)
    }

    fn encoder(&self, _operation: Operation) -> &dyn BatchEncoder {
        &ENCODER
    }

    async fn write_batch(
        &self,
        operation: Operation,
        batch: &Batch,
        context: &RunContext,
    ) -> MartechResult<DeliveryResponse> {
        match operation {
            Operation::UploadProfiles => self.upload_contacts(batch, context).await,
            Operation::UploadEvents => self.upload_activities(batch).await,
            Operation::DeleteProfiles => bail!(
                ErrorKind::ConfigError,
                "Netcore does not support profile deletion"
            ),
        }
    }
}
