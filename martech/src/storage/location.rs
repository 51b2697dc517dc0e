use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, MartechResult};

/// A bucket and key pair, parsed from or rendered as an `s3://bucket/key` url.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parses `s3://bucket/key`. The key may be empty, in which case the location names the
    /// whole bucket.
    pub fn parse(url: &str) -> MartechResult<ObjectLocation> {
        let Some(rest) = url.strip_prefix("s3://") else {
            bail!(
                ErrorKind::ConfigError,
                "Object store url must start with s3://",
                url
            );
        };

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            bail!(ErrorKind::ConfigError, "Object store url has no bucket", url);
        }

        Ok(ObjectLocation::new(bucket, key))
    }

    /// Public https url of the object for `region`.
    pub fn public_url(&self, region: &str) -> String {
        format!(
            "https://{}.s3.{region}.amazonaws.com/{}",
            self.bucket, self.key
        )
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
