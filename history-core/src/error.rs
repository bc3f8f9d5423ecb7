//! Error types for history operations.

use thiserror::Error;

use crate::node::NodeId;
use crate::snapshot::SnapshotId;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Structural errors raised by the history graph, cursor and snapshot store.
///
/// Soft navigation boundaries (running off either end of history) are not
/// errors; see [`StepOutcome`](crate::cursor::StepOutcome).
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The requested parent does not exist in the graph.
    #[error("Parent node not found: {0}")]
    ParentNotFound(NodeId),

    /// The requested node does not exist in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A parent chain revisited a node or skipped the root.
    #[error("Cycle detected at node: {0}")]
    CycleDetected(NodeId),

    /// A new node would sit deeper than the configured maximum.
    #[error("Depth {depth} exceeds maximum of {max}")]
    DepthExceeded {
        /// Depth the new node would have had.
        depth: usize,
        /// Configured maximum depth.
        max: usize,
    },

    /// The graph already has a root.
    #[error("History graph already has a root")]
    AlreadyInitialized,

    /// The graph has no root yet.
    #[error("History graph has no root")]
    NotInitialized,

    /// Imported data failed validation; the current graph is unchanged.
    #[error("Invalid import: {0}")]
    InvalidImport(String),

    /// Confidence outside `[0.0, 1.0]` (or NaN).
    #[error("Confidence {0} is outside [0, 1]")]
    InvalidConfidence(f32),

    /// Snapshot payload not present in the store.
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Whether a navigation caller should treat this as "stay put".
    #[must_use]
    pub const fn is_stale_target(&self) -> bool {
        matches!(self, Self::NodeNotFound(_))
    }
}
