use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How events are named and timestamped when a destination needs it per event.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventConfig {
    /// Fixed event name used for every record.
    #[serde(default)]
    pub event_name: Option<String>,
    /// Record field holding the event name, taking precedence over `event_name`.
    #[serde(default)]
    pub event_name_field: Option<String>,
    /// Record field holding the event timestamp in epoch seconds.
    #[serde(default)]
    pub timestamp_field: Option<String>,
}

/// Configuration for supported delivery destinations.
///
/// Credentials are not part of this configuration: every destination resolves them from its
/// connection in the secrets bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Keeps delivered batches in memory, for dry runs.
    Memory,
    /// CleverTap upload and delete APIs.
    Clevertap {
        #[serde(flatten)]
        event: EventConfig,
    },
    /// Netcore Smartech bulk contact and activity APIs.
    Netcore {
        /// Region of the staging bucket, used to build the public file url.
        #[serde(default = "default_staging_region")]
        staging_region: String,
        /// Prefix of the staged profile files.
        #[serde(default = "default_staging_prefix")]
        staging_prefix: String,
    },
    /// Gamooga bulk visitor property and event APIs.
    Gamooga {
        /// Declared property types sent along with profile uploads.
        #[serde(default)]
        property_types: IndexMap<String, String>,
    },
}

impl DestinationConfig {
    /// Default region of the Netcore staging bucket.
    pub const DEFAULT_STAGING_REGION: &'static str = "ap-south-1";

    /// Default key prefix of staged Netcore profile files.
    pub const DEFAULT_STAGING_PREFIX: &'static str = "netcore_prive_data";

    /// Returns the name of the configured destination.
    pub fn name(&self) -> &'static str {
        match self {
            DestinationConfig::Memory => "memory",
            DestinationConfig::Clevertap { .. } => "clevertap",
            DestinationConfig::Netcore { .. } => "netcore",
            DestinationConfig::Gamooga { .. } => "gamooga",
        }
    }
}

fn default_staging_region() -> String {
    DestinationConfig::DEFAULT_STAGING_REGION.to_string()
}

fn default_staging_prefix() -> String {
    DestinationConfig::DEFAULT_STAGING_PREFIX.to_string()
}
