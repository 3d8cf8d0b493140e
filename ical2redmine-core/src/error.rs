//! Error types for ical2redmine.

use thiserror::Error;

/// Errors that can occur while reconciling a feed against Redmine.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to fetch iCal feed ({url}): {message}")]
    Feed { url: String, message: String },

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Redmine returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Time entry has no id")]
    MissingId,

    #[error("No user with id {0} was found on Redmine")]
    UserNotFound(u64),
}

/// Result type alias for ical2redmine operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        SyncError::Config(msg.into())
    }

    pub fn pattern(pattern: &str, msg: impl Into<String>) -> Self {
        SyncError::Pattern {
            pattern: pattern.to_string(),
            message: msg.into(),
        }
    }

    /// Fatal errors abort the whole run. Everything else only affects the
    /// record or subscription it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_)
                | SyncError::Pattern { .. }
                | SyncError::Feed { .. }
                | SyncError::IcsParse(_)
        )
    }
}
