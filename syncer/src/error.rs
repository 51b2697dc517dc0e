use std::error::Error;

use martech::error::MartechError;
use thiserror::Error;

/// Result type for syncer operations.
pub type SyncerResult<T> = Result<T, SyncerError>;

/// Error type for the syncer binary.
///
/// Wraps [`MartechError`] for pipeline errors and provides variants for the failures the binary
/// itself can run into.
#[derive(Debug, Error)]
pub enum SyncerError {
    /// Pipeline error.
    #[error("{0}")]
    Martech(MartechError),
    /// Configuration or startup error.
    #[error("configuration error: {0}")]
    Config(Box<dyn Error + Send + Sync>),
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The run completed but some batches were not delivered.
    #[error("{failed_batches} batches with {failed_records} records were not delivered")]
    RunFailed {
        failed_batches: usize,
        failed_records: usize,
    },
    /// The run stopped because shutdown was requested.
    #[error("the run was cancelled before every batch was delivered")]
    Cancelled,
    /// Any other error raised while wiring the run.
    #[error(transparent)]
    Other(anyhow::Error),
}

impl SyncerError {
    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        SyncerError::Config(Box::new(err))
    }

    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            SyncerError::Martech(_) => "pipeline error",
            SyncerError::Config(_) => "configuration error",
            SyncerError::Io(_) => "i/o error",
            SyncerError::RunFailed { .. } => "delivery error",
            SyncerError::Cancelled => "cancelled",
            SyncerError::Other(_) => "syncer error",
        }
    }
}

impl From<MartechError> for SyncerError {
    fn from(err: MartechError) -> Self {
        SyncerError::Martech(err)
    }
}

impl From<anyhow::Error> for SyncerError {
    /// Keeps pipeline errors typed when they travelled through [`anyhow`].
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<MartechError>() {
            Ok(err) => SyncerError::Martech(err),
            Err(err) => SyncerError::Other(err),
        }
    }
}
