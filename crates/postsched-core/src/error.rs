//! Error types for the post scheduler
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the post scheduler
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing submission fields (rejected before reaching the store)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable store write failed; the post must not be assumed scheduled
    #[error("Storage write error: {0}")]
    StorageWrite(String),

    /// Durable store read failed
    #[error("Storage read error: {0}")]
    StorageRead(String),

    /// Stored bytes could not be decoded into a post record
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A post names an account that has no configured publishing provider
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// Upload or location update rejected by the publishing provider
    #[error("Publish provider error ({provider}): {message}")]
    PublishProvider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Follower count or listing fetch failed
    #[error("Listing provider error ({source_name}): {message}")]
    ListingProvider {
        /// Listing source name
        source_name: String,
        /// Error message
        message: String,
    },

    /// A provider call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
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
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage write error
    pub fn storage_write(msg: impl Into<String>) -> Self {
        Self::StorageWrite(msg.into())
    }

    /// Create a storage read error
    pub fn storage_read(msg: impl Into<String>) -> Self {
        Self::StorageRead(msg.into())
    }

    /// Create a deserialization error
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an unknown account error
    pub fn unknown_account(account: impl Into<String>) -> Self {
        Self::UnknownAccount(account.into())
    }

    /// Create a publishing provider error
    pub fn publish(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a follower listing error
    pub fn listing(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListingProvider {
            source_name: source.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the dispatcher should try the same post again after this error
    ///
    /// Configuration mismatches (unknown account, validation) are final for the
    /// current visit; provider hiccups and timeouts are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PublishProvider { .. } | Self::Timeout(_) | Self::Io(_) | Self::Other(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
