use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, MartechResult};

pub const DELIVERY_CLIENT__BEFORE_ATTEMPT: &str = "delivery_client.before_attempt";
pub const SYNC_PIPELINE__BEFORE_BATCH: &str = "sync_pipeline.before_batch";

/// Returns an error when the failpoint `name` is configured to return.
///
/// The failpoint parameter selects the error kind: `transient` fails like an unreachable
/// destination, `rejected` like a refused request, anything else like a failed delivery.
pub fn martech_fail_point(name: &str) -> MartechResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::DeliveryError;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "transient" => ErrorKind::DestinationConnectionFailed,
                "rejected" => ErrorKind::DestinationRejected,
                _ => ErrorKind::DeliveryError,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
