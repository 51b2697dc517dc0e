use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How the batcher finds batch boundaries.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// Measures one representative leading chunk and splits the whole set with its size.
    ///
    /// Cheap, but may produce oversize batches when record sizes vary widely.
    Probe,
    /// Grows every batch to the largest prefix whose encoded payload fits the ceiling.
    #[default]
    Exact,
}

/// Batch sizing configuration for deliveries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Ceiling, in bytes, for the encoded payload of a single batch.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Optional cap on the number of records in a single batch.
    #[serde(default)]
    pub max_records: Option<usize>,
    /// Strategy used to find batch boundaries.
    #[serde(default)]
    pub strategy: BatchStrategy,
    /// Number of source rows pulled per read.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

impl BatchConfig {
    /// Default payload ceiling, matching the bulk activity upload limit.
    pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4_500_000;

    /// Default number of source rows pulled per read.
    pub const DEFAULT_READ_CHUNK_SIZE: usize = 1000;

    /// Validates batch configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_payload_bytes == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_payload_bytes".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_records == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_records".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        if self.read_chunk_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.read_chunk_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_records: None,
            strategy: BatchStrategy::default(),
            read_chunk_size: default_read_chunk_size(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    BatchConfig::DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_read_chunk_size() -> usize {
    BatchConfig::DEFAULT_READ_CHUNK_SIZE
}
