//! # Canvas History Session
//!
//! Host layer around `history-core`: one [`DesignSession`] per open design,
//! serializing access to its history, driving momentum on a tokio timer,
//! persisting bundles to a data directory and announcing changes.
//! This library is used by both the `canvas-history` binary and integration
//! tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod momentum;
pub mod persist;
pub mod session;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use momentum::{release_gesture, spawn_momentum, MomentumHandle};
pub use persist::{BundleStore, HistoryBundle, BUNDLE_VERSION};
pub use session::{DesignSession, SessionEvent};
