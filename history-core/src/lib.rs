//! # Canvas History Core
//!
//! Branching edit history for the creative canvas, plus the gesture state
//! machine that scrubs through it.
//!
//! Every user edit and AI suggestion becomes a node in a tree-shaped DAG, so
//! no creative path is ever destroyed. Navigation is by cursor (explicit
//! steps and jumps) or by swipe/scroll gestures with momentum.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             GestureNavigator                │
//! │  - Velocity smoothing  - Momentum/friction  │
//! ├──────────────────────┬──────────────────────┤
//! │  NavigationCursor    │  HistoryGraph        │
//! │  - Current node      │  - Parent/child DAG  │
//! │  - Recency stack     │  - Export/import     │
//! ├──────────────────────┴──────────────────────┤
//! │              SnapshotStore                  │
//! │  - Opaque canvas payloads by content id     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous and free of I/O. Hosts serialize access
//! (one writer at a time) and own timers for momentum ticks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cursor;
pub mod error;
pub mod gesture;
pub mod graph;
pub mod node;
pub mod snapshot;

pub use cursor::{
    BoundCursor, NavigationCursor, NavigationIntent, NavigationTarget, SiblingDirection,
    StepOutcome, DEFAULT_RECENCY_CAPACITY,
};
pub use error::{HistoryError, HistoryResult};
pub use gesture::{
    GestureConfig, GestureDirection, GestureNavigator, GesturePhase, GestureTrigger,
    GestureUpdate, MomentumToken, TickOutcome,
};
pub use graph::{GraphConfig, GraphExport, HistoryGraph, DEFAULT_MAX_DEPTH};
pub use node::{now_ms, ApprovalStatus, HistoryNode, NodeId, NodeMetadata, NodeSource};
pub use snapshot::{Snapshot, SnapshotBundle, SnapshotId, SnapshotStore};

/// History core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
