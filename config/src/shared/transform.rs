use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::ValidationError;

/// Field(s) holding the identity the destination keys records by.
///
/// With several fields, the first one holding a usable value wins.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IdentityFields {
    /// A single identity field.
    Single(String),
    /// Identity fields in priority order.
    Ordered(Vec<String>),
}

impl IdentityFields {
    /// Returns the identity fields in priority order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            IdentityFields::Single(field) => vec![field.as_str()],
            IdentityFields::Ordered(fields) => fields.iter().map(String::as_str).collect(),
        }
    }
}

impl Default for IdentityFields {
    fn default() -> Self {
        IdentityFields::Single(TransformConfig::DEFAULT_IDENTITY_FIELD.to_string())
    }
}

/// Typed coercion applied to a single field.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Coercion {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    /// Reformats dates as `YYYY-MM-DD`; the `dob` field gets the birth date sanitization.
    #[serde(rename = "date")]
    Date,
    /// Keeps the last ten digits of a phone number.
    #[serde(rename = "mobile_sanity")]
    MobileSanity,
    /// Converts a currency amount to minor units.
    #[serde(rename = "modify_reward", alias = "reward")]
    Reward,
    /// Converts a `YYYY-MM-DD` date to the `$D_<seconds>` date notation.
    #[serde(rename = "Unix_epoch", alias = "unix_epoch", alias = "epoch")]
    UnixEpoch,
}

/// Declarative per-record transformation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Identity field(s), in priority order.
    #[serde(default)]
    pub identity_fields: IdentityFields,
    /// Name of a registered custom transform function.
    #[serde(default)]
    pub transform_fn: Option<String>,
    /// Coercion applied to each listed field when present.
    #[serde(default)]
    pub type_map: IndexMap<String, Coercion>,
    /// When set, only these fields are kept, in this order.
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    /// Renames applied in order, `old -> new`.
    #[serde(default)]
    pub key_rename_map: IndexMap<String, String>,
    /// Free-form parameters handed to the custom transform function.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl TransformConfig {
    /// Identity field used when none is configured.
    pub const DEFAULT_IDENTITY_FIELD: &'static str = "customer_id";

    /// Validates transform configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = self.identity_fields.fields();
        if fields.is_empty() || fields.iter().any(|field| field.is_empty()) {
            return Err(ValidationError::MissingIdentityFields);
        }

        if self
            .key_rename_map
            .iter()
            .any(|(old, new)| old.is_empty() || new.is_empty())
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "transform.key_rename_map".to_string(),
                constraint: "field names cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            identity_fields: IdentityFields::default(),
            transform_fn: None,
            type_map: IndexMap::new(),
            attributes: None,
            key_rename_map: IndexMap::new(),
            params: Map::new(),
        }
    }
}
