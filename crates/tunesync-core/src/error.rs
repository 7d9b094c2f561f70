//! Error types for tunesync
//!
//! Every failure a core operation can surface is one variant of [`Error`].
//! The orchestrators convert these into a structured `{success: false, error}`
//! response at their boundary; nothing here is meant to crash the process.

use crate::schema::Table;
use thiserror::Error;

/// Result type alias for tunesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// No authenticated streaming session is active
    #[error("Access to the streaming library denied: no authenticated session")]
    Unauthenticated,

    /// The session belongs to a different user than the one requested
    #[error("May only take action for the currently authorized user (session: {session}, requested: {requested})")]
    ForbiddenUser {
        /// Identity held by the session
        session: String,
        /// Username the caller asked to act on
        requested: String,
    },

    /// More than one record shares a natural key that must be unique
    #[error("Database malformed: multiple {table} records found with key '{key}'")]
    DatabaseMalformed {
        /// Table holding the duplicates
        table: Table,
        /// The duplicated natural key value
        key: String,
    },

    /// One or more song resolutions failed within a sync batch
    #[error("Error adding {failed} of {total} song(s) to the record store")]
    PartialSongFailure {
        /// Number of failed resolutions
        failed: usize,
        /// Batch size
        total: usize,
    },

    /// A call to the streaming service or the record store failed
    #[error("Upstream unavailable ({service}): {message}")]
    UpstreamUnavailable {
        /// Service name (e.g. "airtable", "spotify")
        service: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// I/O errors (file-backed store)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an identity mismatch error
    pub fn forbidden(session: impl Into<String>, requested: impl Into<String>) -> Self {
        Self::ForbiddenUser {
            session: session.into(),
            requested: requested.into(),
        }
    }

    /// Create a uniqueness violation error
    pub fn malformed(table: Table, key: impl Into<String>) -> Self {
        Self::DatabaseMalformed {
            table,
            key: key.into(),
        }
    }

    /// Create an upstream service error
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error signals a uniqueness violation in the store
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::DatabaseMalformed { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_names_table_and_key() {
        let err = Error::malformed(Table::Song, "4uLU6hMCjMI75M1A2tKUQC");
        assert!(err.is_malformed());
        assert_eq!(
            err.to_string(),
            "Database malformed: multiple Song records found with key '4uLU6hMCjMI75M1A2tKUQC'"
        );
    }

    #[test]
    fn forbidden_message_names_both_identities() {
        let err = Error::forbidden("alice", "bob");
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("bob"));
    }
}
