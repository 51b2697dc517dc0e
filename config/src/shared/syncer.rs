use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    BatchConfig, DestinationConfig, FailurePolicy, Operation, RetryConfig, SecretsConfig,
    SourceConfig, TransformConfig, ValidationError,
};

/// Complete configuration of a single sync run.
///
/// Loaded once at startup by the `syncer` binary and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// The destination platform.
    pub destination: DestinationConfig,
    /// Id of the destination connection in the secrets bundle.
    pub connection_id: String,
    /// Id of the connection holding object-store credentials, when the run stages or reads
    /// files.
    #[serde(default)]
    pub aws_connection_id: Option<String>,
    /// What the run does.
    pub operation: Operation,
    /// Where the records come from.
    pub source: SourceConfig,
    /// How each record is transformed.
    #[serde(default)]
    pub transform: TransformConfig,
    /// How records are grouped into payloads.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Delivery retry behavior.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Behavior on a failed batch.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Where connections are looked up.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl SyncerConfig {
    /// Validates the complete run configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.connection_id.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "connection_id".to_string(),
                constraint: "cannot be empty".to_string(),
            });
        }

        self.source.validate()?;
        self.transform.validate()?;
        self.batch.validate()?;
        self.retry.validate()?;

        Ok(())
    }
}

impl Config for SyncerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["transform.attributes"];
}
