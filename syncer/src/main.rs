//! Martech syncer binary.
//!
//! Loads the run configuration, initializes tracing, delivers the configured record set to its
//! destination and exits non-zero when the run did not deliver every batch.

use clap::Parser;
use config::Environment;
use config::shared::SyncerConfig;
use tracing::{error, info, warn};

use crate::cli::{Args, load_syncer_config};
use crate::core::start_syncer_with_config;
use crate::error::{SyncerError, SyncerResult};

mod cli;
mod core;
mod error;

/// Entry point for the syncer.
///
/// Configuration and tracing are set up before the async runtime starts, so that a broken
/// configuration fails fast with a readable error.
fn main() -> SyncerResult<()> {
    let args = Args::parse();

    let environment = Environment::load()?;
    let syncer_config = load_syncer_config(&args)?;

    let _log_flusher = telemetry::init_tracing(env!("CARGO_BIN_NAME"), environment)
        .map_err(SyncerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(syncer_config, environment))
}

async fn async_main(syncer_config: SyncerConfig, environment: Environment) -> SyncerResult<()> {
    let report = match start_syncer_with_config(syncer_config, environment).await {
        Ok(report) => report,
        Err(err) => {
            let err = SyncerError::from(err);
            error!(category = err.category(), "{err}");
            return Err(err);
        }
    };

    if report.had_failures() {
        let err = SyncerError::RunFailed {
            failed_batches: report.counters.batches_failed,
            failed_records: report.counters.total_failed,
        };
        error!(run_id = %report.run_id, category = err.category(), "{err}");
        return Err(err);
    }

    if report.cancelled {
        warn!(run_id = %report.run_id, "sync run cancelled");
        return Err(SyncerError::Cancelled);
    }

    info!(run_id = %report.run_id, "sync run completed");

    Ok(())
}
