//! Record sources feeding a run.

mod base;
mod delimited;
mod inline;
mod template;

use std::sync::Arc;

use config::shared::SourceConfig;

pub use base::RecordSource;
pub use delimited::{ObjectStoreCsvSource, infer_cell};
pub use inline::InlineSource;
pub use template::{ist_now, ist_offset, render_key_template};

use crate::bail;
use crate::error::{ErrorKind, MartechResult};
use crate::storage::{ObjectLocation, ObjectStore};

/// Opens the source described by `config`, reading `chunk_size` records at a time.
///
/// Object store keys are rendered with [`render_key_template`] at the current IST time.
pub async fn open_source(
    config: &SourceConfig,
    store: Option<Arc<dyn ObjectStore>>,
    chunk_size: usize,
) -> MartechResult<Box<dyn RecordSource>> {
    match config {
        SourceConfig::Inline { records } => {
            Ok(Box::new(InlineSource::new(records.clone(), chunk_size)))
        }
        SourceConfig::ObjectStore { bucket, key } => {
            let Some(store) = store else {
                bail!(
                    ErrorKind::ConfigError,
                    "An object store source needs an object store",
                    format!("s3://{bucket}/{key}")
                );
            };

            let location = ObjectLocation::new(bucket.clone(), render_key_template(key, ist_now()));
            let source = ObjectStoreCsvSource::open(store, location, chunk_size).await?;
            Ok(Box::new(source))
        }
    }
}
