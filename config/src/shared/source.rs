use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::ValidationError;

/// Where the records of a run come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// Records supplied directly in the configuration.
    Inline {
        /// The records, in delivery order.
        records: Vec<Map<String, Value>>,
    },
    /// A CSV file stored in the object store.
    ObjectStore {
        /// Bucket holding the file.
        bucket: String,
        /// Key of the file.
        ///
        /// May contain the `{today}`, `{yesterday}`, `{hour}` and `{min}` placeholders, rendered
        /// in Indian Standard Time when the run starts.
        key: String,
    },
}

impl SourceConfig {
    /// Validates source configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            SourceConfig::Inline { .. } => Ok(()),
            SourceConfig::ObjectStore { bucket, key } => {
                if bucket.is_empty() {
                    return Err(ValidationError::SourceConfig(
                        "`bucket` cannot be empty".to_string(),
                    ));
                }
                if key.is_empty() {
                    return Err(ValidationError::SourceConfig(
                        "`key` cannot be empty".to_string(),
                    ));
                }

                Ok(())
            }
        }
    }
}
