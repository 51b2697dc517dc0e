use async_trait::async_trait;

use crate::error::MartechResult;
use crate::types::Record;

/// Lazy, chunked sequence of source records.
#[async_trait]
pub trait RecordSource: Send {
    /// Returns the next chunk of records, or `None` once the source is exhausted.
    ///
    /// Returned chunks are never empty.
    async fn next_chunk(&mut self) -> MartechResult<Option<Vec<Record>>>;
}
