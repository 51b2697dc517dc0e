use serde::{Deserialize, Serialize};

/// Where destination connections are looked up.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Name of the secrets bundle holding the connections.
    ///
    /// When unset, the name is derived from the deployment environment.
    #[serde(default)]
    pub secret_name: Option<String>,
    /// Region of the secrets manager and of the staging buckets.
    #[serde(default = "default_region")]
    pub region: String,
}

impl SecretsConfig {
    /// Default region for secrets and object storage.
    pub const DEFAULT_REGION: &'static str = "ap-south-1";
}

fn default_region() -> String {
    SecretsConfig::DEFAULT_REGION.to_string()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            secret_name: None,
            region: default_region(),
        }
    }
}
