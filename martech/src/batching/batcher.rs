use config::shared::{BatchConfig, BatchStrategy};
use tracing::{debug, warn};

use crate::batching::{BatchEncoder, chunkify};
use crate::error::MartechResult;
use crate::types::{Batch, Record};

/// Splits records into batches whose encoded payload stays under a byte ceiling.
///
/// Records keep their order, and every record ends up in exactly one batch. A record that
/// exceeds the ceiling on its own is emitted as a single-record batch.
pub struct AdaptiveBatcher<'a> {
    encoder: &'a dyn BatchEncoder,
    max_payload_bytes: usize,
    max_records: Option<usize>,
    strategy: BatchStrategy,
}

impl<'a> AdaptiveBatcher<'a> {
    pub fn new(encoder: &'a dyn BatchEncoder, config: &BatchConfig) -> Self {
        Self {
            encoder,
            max_payload_bytes: config.max_payload_bytes,
            max_records: config.max_records,
            strategy: config.strategy,
        }
    }

    /// Lowers the record cap to `max_records` when it is tighter than the configured one.
    pub fn with_record_cap(mut self, max_records: Option<usize>) -> Self {
        self.max_records = match (self.max_records, max_records) {
            (Some(configured), Some(cap)) => Some(configured.min(cap)),
            (configured, cap) => configured.or(cap),
        };
        self
    }

    /// Splits `records` into batches numbered from `first_index`.
    pub fn batches(&self, records: Vec<Record>, first_index: usize) -> MartechResult<Vec<Batch>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let groups: Vec<(Vec<Record>, usize)> = match self.strategy {
            BatchStrategy::Probe => {
                let chunk_size = self.probe_chunk_size(&records)?;
                chunkify(records, chunk_size)?
                    .into_iter()
                    .map(|chunk| {
                        let size_bytes = self.encoder.encoded_len(&chunk)?;
                        Ok((chunk, size_bytes))
                    })
                    .collect::<MartechResult<Vec<_>>>()?
            }
            BatchStrategy::Exact => {
                let sizes = self.exact_sizes(&records)?;
                let mut remaining = records.into_iter();
                sizes
                    .into_iter()
                    .map(|(count, size_bytes)| {
                        (remaining.by_ref().take(count).collect(), size_bytes)
                    })
                    .collect()
            }
        };

        let mut batches = Vec::with_capacity(groups.len());
        for (offset, (records, size_bytes)) in groups.into_iter().enumerate() {
            if records.len() == 1 && size_bytes > self.max_payload_bytes {
                warn!(
                    batch_index = first_index + offset,
                    size_bytes,
                    max_payload_bytes = self.max_payload_bytes,
                    "single record exceeds the payload ceiling, sending it alone"
                );
            }

            batches.push(Batch {
                index: first_index + offset,
                records,
                size_bytes,
            });
        }

        debug!(
            batches = batches.len(),
            strategy = ?self.strategy,
            "split records into batches"
        );

        Ok(batches)
    }

    fn cap(&self) -> usize {
        self.max_records.unwrap_or(usize::MAX).max(1)
    }

    /// Established heuristic: shrinks a uniform chunk size until the first chunk fits.
    ///
    /// Later chunks are not measured against the ceiling before being cut, so batches of
    /// non-uniform records may exceed it.
    fn probe_chunk_size(&self, records: &[Record]) -> MartechResult<usize> {
        let total = records.len();
        let mut divisor = 1;
        let mut chunk = total;

        loop {
            let size = self.encoder.encoded_len(&records[..chunk])?;
            if size <= self.max_payload_bytes || chunk <= 1 {
                break;
            }
            divisor += 1;
            chunk = (total / divisor).max(1);
        }

        Ok(chunk.min(self.cap()))
    }

    /// Greedy accumulator: each batch is the longest prefix of the remaining records that fits.
    ///
    /// Relies on the encoded size growing with the record count, so the longest fitting prefix
    /// can be found by galloping and then bisecting.
    fn exact_sizes(&self, records: &[Record]) -> MartechResult<Vec<(usize, usize)>> {
        let mut sizes = Vec::new();
        let mut start = 0;

        while start < records.len() {
            let rest = &records[start..];
            let limit = rest.len().min(self.cap());

            let (count, size_bytes) = self.longest_fitting_prefix(rest, limit)?;
            sizes.push((count, size_bytes));
            start += count;
        }

        Ok(sizes)
    }

    fn longest_fitting_prefix(
        &self,
        records: &[Record],
        limit: usize,
    ) -> MartechResult<(usize, usize)> {
        let first_size = self.encoder.encoded_len(&records[..1])?;
        if first_size > self.max_payload_bytes || limit == 1 {
            return Ok((1, first_size));
        }

        // `fits` is the longest prefix known to fit, `too_long` the shortest known not to.
        let mut fits = (1, first_size);
        let mut too_long = limit + 1;

        let mut probe = 2;
        while probe <= limit {
            let size = self.encoder.encoded_len(&records[..probe])?;
            if size > self.max_payload_bytes {
                too_long = probe;
                break;
            }
            fits = (probe, size);
            probe = probe.saturating_mul(2);
        }

        if too_long == limit + 1 && fits.0 < limit {
            let size = self.encoder.encoded_len(&records[..limit])?;
            if size <= self.max_payload_bytes {
                return Ok((limit, size));
            }
            too_long = limit;
        }

        while too_long - fits.0 > 1 {
            let mid = fits.0 + (too_long - fits.0) / 2;
            let size = self.encoder.encoded_len(&records[..mid])?;
            if size <= self.max_payload_bytes {
                fits = (mid, size);
            } else {
                too_long = mid;
            }
        }

        Ok(fits)
    }
}
