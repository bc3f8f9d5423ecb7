//! Serialized access to one design session's history.
//!
//! [`DesignSession`] owns the graph, cursor, gesture navigator and snapshot
//! store behind a single lock. Every mutation (including storing a snapshot
//! and linking its node) happens under that lock, so node creation order and
//! `childIds` order follow lock acquisition order.
//!
//! Changes are announced on a broadcast channel so a UI can re-render without
//! polling. Creation events are sent before the lock is released, so their
//! order is the order nodes were linked.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use history_core::{
    GestureNavigator, GesturePhase, GestureUpdate, HistoryError, HistoryGraph, HistoryNode,
    HistoryResult, MomentumToken, NavigationCursor, NavigationIntent, NavigationTarget, NodeId,
    NodeMetadata, NodeSource, SiblingDirection, Snapshot, SnapshotStore, StepOutcome,
    TickOutcome,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::persist::HistoryBundle;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Something the UI should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A node was added.
    #[serde(rename_all = "camelCase")]
    NodeCreated {
        /// The new node.
        node_id: NodeId,
        /// Its parent (`None` for the root).
        parent_id: Option<NodeId>,
        /// Provenance.
        source: NodeSource,
    },
    /// The current node changed.
    #[serde(rename_all = "camelCase")]
    Navigated {
        /// Where the cursor was.
        from: NodeId,
        /// Where it is now.
        to: NodeId,
    },
    /// A bundle replaced the whole history.
    #[serde(rename_all = "camelCase")]
    Imported {
        /// Root of the imported graph.
        root_id: NodeId,
        /// Number of nodes imported.
        node_count: usize,
    },
    /// The history was cleared.
    Reset,
}

#[derive(Debug)]
struct SessionInner {
    graph: HistoryGraph,
    cursor: Option<NavigationCursor>,
    navigator: GestureNavigator,
    snapshots: SnapshotStore,
}

impl SessionInner {
    fn cursor_mut(&mut self) -> SessionResult<&mut NavigationCursor> {
        Ok(self.cursor.as_mut().ok_or(HistoryError::NotInitialized)?)
    }
}

/// Shared handle to one design session. Clones refer to the same session.
#[derive(Debug, Clone)]
pub struct DesignSession {
    inner: Arc<Mutex<SessionInner>>,
    event_tx: broadcast::Sender<SessionEvent>,
    config: Arc<SessionConfig>,
}

impl DesignSession {
    /// Create an empty session.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = SessionInner {
            graph: HistoryGraph::with_config(config.graph),
            cursor: None,
            navigator: GestureNavigator::with_config(config.gesture.clone()),
            snapshots: SnapshotStore::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            event_tx,
            config: Arc::new(config),
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Interval between momentum ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.lock().navigator.config().tick_interval
    }

    /// Upper bound on momentum ticks before settling.
    #[must_use]
    pub fn max_settle_ticks(&self) -> u32 {
        self.lock().navigator.max_settle_ticks()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Seed the session with its root state. The cursor starts there.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::AlreadyInitialized`] if a root exists.
    pub fn create_root(
        &self,
        payload: impl Into<Snapshot>,
        metadata: NodeMetadata,
    ) -> SessionResult<NodeId> {
        let snapshot = payload.into();
        let mut inner = self.lock();
        let id = inner.graph.create_root(snapshot.id(), metadata)?;
        inner.snapshots.put(snapshot);
        inner.cursor = Some(NavigationCursor::with_capacity(
            &inner.graph,
            self.config.recency_capacity,
        )?);
        self.emit(SessionEvent::NodeCreated {
            node_id: id,
            parent_id: None,
            source: NodeSource::UserEdit,
        });
        Ok(id)
    }

    /// Record a new state derived from `parent_id`.
    ///
    /// The snapshot is stored only if the node is created.
    ///
    /// # Errors
    ///
    /// Same as [`HistoryGraph::create_child`].
    pub fn create_child(
        &self,
        parent_id: NodeId,
        payload: impl Into<Snapshot>,
        source: NodeSource,
        prompt: impl Into<String>,
        confidence: f32,
        metadata: NodeMetadata,
    ) -> SessionResult<NodeId> {
        let snapshot = payload.into();
        let mut inner = self.lock();
        let id = inner.graph.create_child(
            parent_id,
            snapshot.id(),
            source,
            prompt,
            confidence,
            metadata,
        )?;
        inner.snapshots.put(snapshot);
        // Sent under the lock so event order matches `childIds` order.
        self.emit(SessionEvent::NodeCreated {
            node_id: id,
            parent_id: Some(parent_id),
            source,
        });
        Ok(id)
    }

    /// Update a node's annotations.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist.
    pub fn update_metadata<F>(&self, id: NodeId, f: F) -> SessionResult<()>
    where
        F: FnOnce(&mut NodeMetadata),
    {
        Ok(self.lock().graph.update_metadata(id, f)?)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The node the user is on.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn current(&self) -> SessionResult<NodeId> {
        Ok(self.lock().cursor_mut()?.current())
    }

    /// A copy of a node.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist.
    pub fn node(&self, id: NodeId) -> SessionResult<HistoryNode> {
        Ok(self.lock().graph.get_node(id)?.clone())
    }

    /// The snapshot to render for the current node.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists, or
    /// [`HistoryError::SnapshotNotFound`] if the payload is missing.
    pub fn current_snapshot(&self) -> SessionResult<Snapshot> {
        let mut inner = self.lock();
        let current = inner.cursor_mut()?.current();
        let snapshot_id = inner.graph.get_node(current)?.snapshot_id();
        Ok(inner.snapshots.get(snapshot_id)?.clone())
    }

    /// Recently visited nodes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn history(&self) -> SessionResult<Vec<NodeId>> {
        Ok(self.lock().cursor_mut()?.history())
    }

    /// Root-first path to `id`.
    ///
    /// # Errors
    ///
    /// Same as [`HistoryGraph::get_path_to_root`].
    pub fn path_to_root(&self, id: NodeId) -> SessionResult<Vec<NodeId>> {
        Ok(self.lock().graph.get_path_to_root(id)?)
    }

    /// Run a read-only closure against the graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&HistoryGraph) -> R) -> R {
        f(&self.lock().graph)
    }

    /// Number of nodes in the history.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.lock().graph.len()
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Move to an arbitrary node.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist.
    pub fn jump_to(&self, id: NodeId) -> SessionResult<()> {
        let from = {
            let mut inner = self.lock();
            let SessionInner { graph, cursor, .. } = &mut *inner;
            let cursor = cursor.as_mut().ok_or(HistoryError::NotInitialized)?;
            let from = cursor.current();
            cursor.jump_to(graph, id)?;
            from
        };
        if from != id {
            self.emit(SessionEvent::Navigated { from, to: id });
        }
        Ok(())
    }

    /// Step to the first child.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn step_next(&self) -> SessionResult<StepOutcome> {
        self.navigate(NavigationIntent::Next)
    }

    /// Step back to the previous node.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn step_previous(&self) -> SessionResult<StepOutcome> {
        self.navigate(NavigationIntent::Previous)
    }

    /// Switch to a neighbouring branch.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn step_sibling(&self, direction: SiblingDirection) -> SessionResult<StepOutcome> {
        self.navigate(NavigationIntent::Sibling(direction))
    }

    /// Apply a navigation intent.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn navigate(&self, intent: NavigationIntent) -> SessionResult<StepOutcome> {
        Ok(self.apply(intent)?)
    }

    fn apply(&self, intent: NavigationIntent) -> HistoryResult<StepOutcome> {
        let (from, outcome) = {
            let mut inner = self.lock();
            let SessionInner { graph, cursor, .. } = &mut *inner;
            let cursor = cursor.as_mut().ok_or(HistoryError::NotInitialized)?;
            let from = cursor.current();
            (from, cursor.apply(graph, intent)?)
        };
        if let StepOutcome::Moved(to) = outcome {
            self.emit(SessionEvent::Navigated { from, to });
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    /// Feed one gesture sample.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before the root exists.
    pub fn on_gesture_sample(&self, delta: f32, dt: Duration) -> SessionResult<GestureUpdate> {
        let (from, update) = {
            let mut inner = self.lock();
            let SessionInner {
                graph,
                cursor,
                navigator,
                ..
            } = &mut *inner;
            let cursor = cursor.as_mut().ok_or(HistoryError::NotInitialized)?;
            let from = cursor.current();
            let update = navigator.on_gesture_sample(&mut cursor.bind(graph), delta, dt)?;
            (from, update)
        };
        if let Some(StepOutcome::Moved(to)) = update.trigger.map(|t| t.outcome) {
            self.emit(SessionEvent::Navigated { from, to });
        }
        Ok(update)
    }

    /// End the gesture; returns a token if momentum should run.
    #[must_use]
    pub fn on_gesture_end(&self) -> Option<MomentumToken> {
        self.lock().navigator.on_gesture_end()
    }

    /// Abort the gesture; pending momentum ticks become inert.
    pub fn on_gesture_cancel(&self) {
        self.lock().navigator.on_gesture_cancel();
    }

    /// Apply one momentum tick.
    #[must_use]
    pub fn tick(&self, token: MomentumToken) -> TickOutcome {
        self.lock().navigator.tick(token)
    }

    /// Current gesture velocity in px/ms.
    #[must_use]
    pub fn gesture_velocity(&self) -> f32 {
        self.lock().navigator.velocity()
    }

    /// Current gesture phase.
    #[must_use]
    pub fn gesture_phase(&self) -> GesturePhase {
        self.lock().navigator.phase()
    }

    // -----------------------------------------------------------------------
    // Export / Import
    // -----------------------------------------------------------------------

    /// Export the graph and every snapshot it references.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] for an empty session, or
    /// [`HistoryError::SnapshotNotFound`] if a payload is missing.
    pub fn export_bundle(&self) -> SessionResult<HistoryBundle> {
        let inner = self.lock();
        let graph = inner.graph.export_graph()?;
        let snapshots = inner.snapshots.bundle(graph.snapshot_ids())?;
        Ok(HistoryBundle::new(graph, snapshots))
    }

    /// Replace the whole history with a bundle.
    ///
    /// Everything is validated before the swap: graph invariants, snapshot
    /// content addresses, and that every referenced snapshot is present. On
    /// failure the session is unchanged. On success the cursor returns to the
    /// root and any gesture is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidImport`] describing the first problem.
    pub fn import_bundle(&self, bundle: HistoryBundle) -> SessionResult<()> {
        let mut graph = HistoryGraph::with_config(self.config.graph);
        graph.import_graph(bundle.graph)?;
        let snapshots = SnapshotStore::from_bundle(bundle.snapshots)?;
        if let Some(missing) = graph
            .snapshot_ids()
            .into_iter()
            .find(|id| !snapshots.contains(*id))
        {
            return Err(HistoryError::InvalidImport(format!(
                "bundle is missing snapshot {missing}"
            ))
            .into());
        }
        let cursor = NavigationCursor::with_capacity(&graph, self.config.recency_capacity)?;
        let root_id = cursor.current();
        let node_count = graph.len();

        {
            let mut inner = self.lock();
            inner.graph = graph;
            inner.snapshots = snapshots;
            inner.cursor = Some(cursor);
            inner.navigator.on_gesture_cancel();
        }
        tracing::info!(root = %root_id, nodes = node_count, "Imported history bundle");
        self.emit(SessionEvent::Imported {
            root_id,
            node_count,
        });
        Ok(())
    }

    /// Clear the history. The cursor and any gesture are reset.
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.graph.reset();
            inner.snapshots.clear();
            inner.cursor = None;
            inner.navigator.on_gesture_cancel();
        }
        self.emit(SessionEvent::Reset);
    }
}

impl Default for DesignSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl NavigationTarget for DesignSession {
    fn navigate(&mut self, intent: NavigationIntent) -> HistoryResult<StepOutcome> {
        self.apply(intent)
    }
}
