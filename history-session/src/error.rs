//! Error types for session operations.

use history_core::HistoryError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A history operation failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A bundle could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No saved bundle under this name.
    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    /// The bundle was written by an incompatible version.
    #[error("Unsupported bundle version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
}

impl SessionError {
    /// Whether the underlying history error is a missing node.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::History(HistoryError::NodeNotFound(_) | HistoryError::ParentNotFound(_))
                | Self::BundleNotFound(_)
        )
    }
}
