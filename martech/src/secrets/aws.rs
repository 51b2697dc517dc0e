use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use tracing::debug;

use crate::error::{ErrorKind, MartechResult};
use crate::secrets::SecretsStore;
use crate::{bail, martech_error};

/// Secrets store backed by AWS Secrets Manager.
///
/// Binary secrets are expected to hold base64 text and are decoded before being returned.
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerStore {
    client: Client,
}

impl AwsSecretsManagerStore {
    /// Creates a store for `region` using the default credential chain.
    pub async fn new(region: impl Into<String>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.into()))
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl SecretsStore for AwsSecretsManagerStore {
    async fn get_secret(&self, name: &str) -> MartechResult<SecretString> {
        debug!(secret_name = name, "fetching secret");

        let output = match self.client.get_secret_value().secret_id(name).send().await {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception())
                {
                    bail!(ErrorKind::SecretNotFound, "Secret not found", name);
                }

                return Err(martech_error!(
                    ErrorKind::SecretsStoreError,
                    "Failed to fetch secret",
                    DisplayErrorContext(&err),
                    source: err
                ));
            }
        };

        if let Some(secret) = output.secret_string() {
            return Ok(SecretString::new(secret.to_owned()));
        }

        if let Some(binary) = output.secret_binary() {
            let decoded = STANDARD.decode(binary.as_ref())?;
            return Ok(SecretString::new(String::from_utf8(decoded)?));
        }

        bail!(ErrorKind::SecretsStoreError, "Secret has no payload", name)
    }
}
