use clap::Parser;
use config::load_config;
use config::shared::{Operation, SyncerConfig};

use crate::error::{SyncerError, SyncerResult};

/// Command line overrides applied on top of the loaded configuration.
#[derive(Debug, Parser)]
#[command(version, about = "Delivers one batch of martech records to a destination")]
pub struct Args {
    /// Operation to perform instead of the configured one.
    #[arg(long)]
    pub operation: Option<Operation>,
}

/// Loads the syncer configuration, applies `args` and validates the result.
pub fn load_syncer_config(args: &Args) -> SyncerResult<SyncerConfig> {
    let mut config = load_config::<SyncerConfig>().map_err(SyncerError::config)?;
    if let Some(operation) = args.operation {
        config.operation = operation;
    }
    config.validate().map_err(SyncerError::config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_flag_is_parsed() {
        let args = Args::try_parse_from(["syncer", "--operation", "delete_profiles"]).unwrap();
        assert_eq!(args.operation, Some(Operation::DeleteProfiles));

        let args = Args::try_parse_from(["syncer"]).unwrap();
        assert_eq!(args.operation, None);
    }

    #[test]
    fn unknown_operation_is_refused() {
        assert!(Args::try_parse_from(["syncer", "--operation", "merge_profiles"]).is_err());
    }
}
