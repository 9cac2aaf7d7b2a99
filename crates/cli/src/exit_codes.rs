//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — cron jobs and service
//! supervisors rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 3       | config           | Settings file unreadable or invalid      |
//! | 50-59   | fetch            | Harvest inputs (feed, stored snapshot)   |
//! | 60-69   | harvest          | Reconciliation and store writes          |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`harvest_exit_code`] or the command's error handling

use callwatch_feed::FeedError;
use callwatch_harvest::{HarvestError, HarvestInput};

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Settings file missing (when given explicitly), unparsable or invalid.
pub const EXIT_CONFIG: u8 = 3;

// =============================================================================
// Fetch (50-59)
// =============================================================================

/// Feed unreachable (connect, timeout) after retries.
pub const EXIT_FETCH_NETWORK: u8 = 50;

/// Feed answered with a non-success status after retries.
pub const EXIT_FETCH_HTTP: u8 = 51;

/// Feed body was not the expected JSON.
pub const EXIT_FETCH_PARSE: u8 = 52;

/// Stored active calls could not be read.
pub const EXIT_FETCH_STORE: u8 = 53;

// =============================================================================
// Harvest (60-69)
// =============================================================================

/// Feed reported a status outside dispatched / on scene / resolved.
/// Nothing was written.
pub const EXIT_HARVEST_UNKNOWN_STATUS: u8 = 60;

/// A store write failed part way; earlier writes are kept.
pub const EXIT_HARVEST_WRITE: u8 = 61;

/// Harvest deadline passed or the run was cancelled.
pub const EXIT_HARVEST_CANCELLED: u8 = 62;

/// Database could not be opened.
pub const EXIT_STORE_OPEN: u8 = 63;

// =============================================================================
// Harvest Error Types
// =============================================================================

/// Map a HarvestError to its exit code.
pub fn harvest_exit_code(err: &HarvestError) -> u8 {
    match err {
        HarvestError::Fetch { input: HarvestInput::Store, .. } => EXIT_FETCH_STORE,
        HarvestError::Fetch { source, .. } => match source.downcast_ref::<FeedError>() {
            Some(FeedError::Network(_)) => EXIT_FETCH_NETWORK,
            Some(FeedError::Http(..)) => EXIT_FETCH_HTTP,
            Some(FeedError::Parse(_)) => EXIT_FETCH_PARSE,
            Some(FeedError::Cancelled) => EXIT_HARVEST_CANCELLED,
            None => EXIT_ERROR,
        },
        HarvestError::UnknownStatus { .. } => EXIT_HARVEST_UNKNOWN_STATUS,
        HarvestError::CommandExecution { .. } => EXIT_HARVEST_WRITE,
        HarvestError::Cancelled => EXIT_HARVEST_CANCELLED,
    }
}

/// Structured error output for `--json` runs.
#[derive(Debug, serde::Serialize)]
pub struct HarvestErrorOutput {
    pub error: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl HarvestErrorOutput {
    pub fn from_harvest_error(err: &HarvestError) -> Self {
        let error = match err {
            HarvestError::Fetch { .. } => "fetch_failed",
            HarvestError::UnknownStatus { .. } => "unknown_status",
            HarvestError::CommandExecution { .. } => "write_failed",
            HarvestError::Cancelled => "cancelled",
        };
        Self {
            error,
            message: err.to_string(),
            exit_code: harvest_exit_code(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callwatch_recon::Category;

    #[test]
    fn test_feed_errors_map_by_kind() {
        let err = HarvestError::Fetch {
            input: HarvestInput::Feed(Category::Fire),
            source: Box::new(FeedError::Http(503, String::new())),
        };
        assert_eq!(harvest_exit_code(&err), EXIT_FETCH_HTTP);

        let err = HarvestError::Fetch {
            input: HarvestInput::Feed(Category::Police),
            source: Box::new(FeedError::Network("refused".into())),
        };
        assert_eq!(harvest_exit_code(&err), EXIT_FETCH_NETWORK);
    }

    #[test]
    fn test_unknown_status_output() {
        let err = HarvestError::UnknownStatus {
            category: Category::Police,
            status: "missing".into(),
        };
        let out = HarvestErrorOutput::from_harvest_error(&err);
        assert_eq!(out.exit_code, EXIT_HARVEST_UNKNOWN_STATUS);
        assert_eq!(out.error, "unknown_status");
        assert!(out.message.contains("missing"));
    }
}
