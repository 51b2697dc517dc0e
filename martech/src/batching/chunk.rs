use crate::bail;
use crate::error::{ErrorKind, MartechResult};

/// Splits `items` into consecutive chunks of `chunk_size`; the last chunk may be shorter.
pub fn chunkify<T>(items: Vec<T>, chunk_size: usize) -> MartechResult<Vec<Vec<T>>> {
    if chunk_size == 0 {
        bail!(
            ErrorKind::ValidationError,
            "Chunk size must be a positive integer"
        );
    }

    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(chunk_size).collect());
    }

    Ok(chunks)
}
