//! Messages of the log lines used for run accounting.

/// Message of the per-batch egress line.
pub const BATCH_DELIVERED_MESSAGE: &str = "batch delivered";

/// Message of the staged file egress line.
pub const FILE_STAGED_MESSAGE: &str = "file staged";

/// Message of the end of run summary line.
pub const RUN_SUMMARY_MESSAGE: &str = "sync run finished";
