use crate::types::Record;

/// A group of records delivered with a single destination call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position of the batch within its run, starting at 0.
    pub index: usize,
    /// The records, in source order.
    pub records: Vec<Record>,
    /// Size in bytes of the encoded payload.
    pub size_bytes: usize,
}

impl Batch {
    /// Returns the number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
