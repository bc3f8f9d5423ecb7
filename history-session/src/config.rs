//! Session configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CANVAS_HISTORY_MAX_DEPTH` | 50 |
//! | `CANVAS_HISTORY_RECENCY` | 10 |
//! | `CANVAS_HISTORY_TRIGGER` | 1.2 px/ms |
//! | `CANVAS_HISTORY_FLOOR` | 0.05 px/ms |
//! | `CANVAS_HISTORY_FRICTION` | 0.92 |
//! | `CANVAS_HISTORY_TICK_MS` | 16 |
//! | `CANVAS_HISTORY_DATA_DIR` | unset (no persistence) |
//!
//! Absent or unparsable values fall back to the default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use history_core::{GestureConfig, GraphConfig, DEFAULT_RECENCY_CAPACITY};

/// Maximum graph depth.
pub const ENV_MAX_DEPTH: &str = "CANVAS_HISTORY_MAX_DEPTH";
/// Cursor recency stack capacity.
pub const ENV_RECENCY: &str = "CANVAS_HISTORY_RECENCY";
/// Gesture trigger threshold in px/ms.
pub const ENV_TRIGGER: &str = "CANVAS_HISTORY_TRIGGER";
/// Momentum floor in px/ms.
pub const ENV_FLOOR: &str = "CANVAS_HISTORY_FLOOR";
/// Friction per settling tick.
pub const ENV_FRICTION: &str = "CANVAS_HISTORY_FRICTION";
/// Settling tick interval in milliseconds.
pub const ENV_TICK_MS: &str = "CANVAS_HISTORY_TICK_MS";
/// Directory for saved bundles.
pub const ENV_DATA_DIR: &str = "CANVAS_HISTORY_DATA_DIR";

/// Configuration for a [`DesignSession`](crate::DesignSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Graph limits.
    pub graph: GraphConfig,
    /// Cursor recency stack capacity.
    pub recency_capacity: usize,
    /// Gesture tuning.
    pub gesture: GestureConfig,
    /// Where bundles are saved, if anywhere.
    pub data_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            recency_capacity: DEFAULT_RECENCY_CAPACITY,
            gesture: GestureConfig::default(),
            data_dir: None,
        }
    }
}

impl SessionConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let graph = GraphConfig {
            max_depth: read(&lookup, ENV_MAX_DEPTH).unwrap_or(defaults.graph.max_depth),
        };
        let gesture = GestureConfig {
            trigger_threshold: read(&lookup, ENV_TRIGGER)
                .unwrap_or(defaults.gesture.trigger_threshold),
            momentum_floor: read(&lookup, ENV_FLOOR).unwrap_or(defaults.gesture.momentum_floor),
            friction: read(&lookup, ENV_FRICTION).unwrap_or(defaults.gesture.friction),
            tick_interval: read(&lookup, ENV_TICK_MS)
                .map_or(defaults.gesture.tick_interval, Duration::from_millis),
            ..defaults.gesture
        }
        .sanitized();

        Self {
            graph,
            recency_capacity: read(&lookup, ENV_RECENCY).unwrap_or(defaults.recency_capacity),
            gesture,
            data_dir: lookup(ENV_DATA_DIR)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn read<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %value, "Ignoring unparsable configuration value");
    }
    parsed
}
