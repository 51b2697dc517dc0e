use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// No identity field was configured for the transformation.
    #[error("`transform.identity_fields` must name at least one field")]
    MissingIdentityFields,
    /// The configured source cannot feed the configured operation.
    #[error("Invalid source config: {0}")]
    SourceConfig(String),
}
