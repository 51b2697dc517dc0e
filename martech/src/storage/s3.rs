use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{ErrorKind, MartechError, MartechResult};
use crate::martech_error;
use crate::storage::ObjectStore;

/// Maximum number of keys accepted by a single `DeleteObjects` call.
const MAX_DELETE_KEYS: usize = 1000;

/// Settings of an [`S3ObjectStore`].
#[derive(Debug, Clone)]
pub struct S3ObjectStoreConfig {
    pub region: String,
    /// Static access key. The default credential chain is used when unset.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    /// Endpoint of an S3 compatible service; switches to path-style addressing.
    pub endpoint_url: Option<String>,
}

impl S3ObjectStoreConfig {
    /// Builds settings from an AWS connection: login and password hold the access key pair and
    /// `extra.endpoint_url` optionally points at an S3 compatible service.
    pub fn from_connection(connection: &Connection, region: impl Into<String>) -> Self {
        Self {
            region: connection
                .extra_str("region_name")
                .map(str::to_owned)
                .unwrap_or_else(|| region.into()),
            access_key_id: connection.login.clone(),
            secret_access_key: connection.password.clone(),
            endpoint_url: connection.extra_str("endpoint_url").map(str::to_owned),
        }
    }
}

/// Object store backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(config: S3ObjectStoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = aws_sdk_s3::config::Credentials::new(
                access_key,
                secret_key.expose_secret(),
                None,
                None,
                "martech-connection",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

fn sdk_error<E, R>(description: &'static str, target: String, err: SdkError<E, R>) -> MartechError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    martech_error!(
        ErrorKind::ObjectStoreError,
        description,
        format!("{target}: {}", DisplayErrorContext(&err)),
        source: err
    )
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> MartechResult<()> {
        debug!(bucket, key, bytes = data.len(), "putting object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| sdk_error("Failed to put object", format!("s3://{bucket}/{key}"), err))?;

        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> MartechResult<Option<Bytes>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(sdk_error(
                    "Failed to get object",
                    format!("s3://{bucket}/{key}"),
                    err,
                ));
            }
        };

        let body = output.body.collect().await.map_err(|err| {
            martech_error!(
                ErrorKind::ObjectStoreError,
                "Failed to read object body",
                format!("s3://{bucket}/{key}"),
                source: err
            )
        })?;

        Ok(Some(body.into_bytes()))
    }

    async fn exists(&self, bucket: &str, key: &str) -> MartechResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(sdk_error(
                "Failed to check object",
                format!("s3://{bucket}/{key}"),
                err,
            )),
        }
    }

    async fn list_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> MartechResult<Vec<String>> {
        let (prefixes, _) = self.list(bucket, prefix, Some(delimiter)).await?;
        Ok(prefixes)
    }

    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> MartechResult<Vec<String>> {
        let (_, keys) = self.list(bucket, prefix, delimiter).await?;
        Ok(keys)
    }

    async fn delete(&self, bucket: &str, keys: &[String]) -> MartechResult<()> {
        for chunk in keys.chunks(MAX_DELETE_KEYS) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    martech_error!(
                        ErrorKind::ObjectStoreError,
                        "Invalid object identifier",
                        bucket,
                        source: err
                    )
                })?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|err| {
                    martech_error!(
                        ErrorKind::ObjectStoreError,
                        "Invalid delete request",
                        bucket,
                        source: err
                    )
                })?;

            self.client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| sdk_error("Failed to delete objects", bucket.to_owned(), err))?;
        }

        Ok(())
    }
}

impl S3ObjectStore {
    /// Lists common prefixes and keys below `prefix`, following continuation tokens.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> MartechResult<(Vec<String>, Vec<String>)> {
        let mut prefixes = Vec::new();
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_delimiter(delimiter.map(str::to_owned))
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|err| {
                    sdk_error("Failed to list objects", format!("s3://{bucket}/{prefix}"), err)
                })?;

            prefixes.extend(
                output
                    .common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix().map(str::to_owned)),
            );
            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_owned)),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_owned());
                }
                _ => break,
            }
        }

        Ok((prefixes, keys))
    }
}
