//! Payload encoding and size-bounded batching.

mod batcher;
mod chunk;
mod encoder;

pub use batcher::AdaptiveBatcher;
pub use chunk::chunkify;
pub use encoder::{BatchEncoder, CsvEncoder, FieldListEncoder, JsonArrayEncoder};
