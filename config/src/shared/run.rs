use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The operation a sync run performs against its destination.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Upserts customer profiles.
    UploadProfiles,
    /// Uploads customer events.
    UploadEvents,
    /// Deletes customer profiles by identity.
    DeleteProfiles,
}

impl Operation {
    /// Returns the snake case name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::UploadProfiles => "upload_profiles",
            Operation::UploadEvents => "upload_events",
            Operation::DeleteProfiles => "delete_profiles",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload_profiles" => Ok(Operation::UploadProfiles),
            "upload_events" => Ok(Operation::UploadEvents),
            "delete_profiles" => Ok(Operation::DeleteProfiles),
            other => Err(format!(
                "{other} is not a supported operation. Use one of `upload_profiles`, `upload_events` or `delete_profiles`."
            )),
        }
    }
}

/// What a run does when a batch cannot be delivered.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Records a failed outcome for the batch and moves on to the next one.
    #[default]
    Continue,
    /// Stops the run on the first failed batch and returns its error.
    FailFast,
}
