//! Egress logging for delivery volume tracking.
//!
//! Every line logged through [`egress_info!`] carries `egress_metric = true` so log aggregators
//! can sum the bytes and records a run pushed to third parties.

/// Logs an egress line at info level with `egress_metric = true` included.
///
/// Accepts a message constant followed by any key=value pairs.
#[macro_export]
macro_rules! egress_info {
    ($message:expr $(, $($fields:tt)*)?) => {
        tracing::info!(
            message = $message,
            egress_metric = true,
            $($($fields)*)?
        )
    };
}
