//! Storage errors

use std::io;
use std::path::PathBuf;

use beacon_protocol::ProtocolError;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors from schema mapping, provisioning and the storage engine
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database driver error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Table or column name cannot be used as an SQL identifier
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Event shape cannot be turned into a table
    #[error("schema error: {0}")]
    Schema(String),

    /// Leaf value cannot be bound as a parameter
    #[error("unsupported value for column '{column}': {message}")]
    UnsupportedValue {
        /// Column being bound
        column: String,
        /// What was wrong
        message: String,
    },

    /// Database directory could not be created
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Event could not be flattened
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl StorageError {
    /// Create an InvalidIdentifier error
    pub fn invalid_identifier(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason,
        }
    }

    /// Create a Schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}
