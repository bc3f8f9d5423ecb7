//! Navigation cursor - where the user currently is in the history graph.
//!
//! "Previous" means "where I just was", not "my parent": the cursor keeps a
//! bounded recency stack so stepping back after jumping across branches
//! returns to the branch the user came from. Only when the stack is empty
//! does it fall back to the parent link.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::graph::HistoryGraph;
use crate::node::NodeId;
use crate::{HistoryError, HistoryResult};

/// Default recency stack capacity.
pub const DEFAULT_RECENCY_CAPACITY: usize = 10;

/// Result of a navigation step.
///
/// Running off either end of history is an expected, user-facing situation,
/// so it is reported here rather than as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "node", rename_all = "camelCase")]
pub enum StepOutcome {
    /// The cursor moved to this node.
    Moved(NodeId),
    /// Already at the root with nothing to go back to.
    AtRoot,
    /// Already at a node without children.
    AtLeaf,
    /// No sibling in the requested direction.
    NoSibling,
}

impl StepOutcome {
    /// Whether the cursor moved.
    #[must_use]
    pub const fn moved(&self) -> bool {
        matches!(self, Self::Moved(_))
    }

    /// Whether this is a soft stop at an end of history.
    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        !self.moved()
    }
}

/// Direction among siblings (creation order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingDirection {
    /// The next-created sibling.
    Next,
    /// The previously-created sibling.
    Previous,
}

/// A discrete navigation command, as produced by gestures or key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationIntent {
    /// Step to the first child.
    Next,
    /// Step back through the recency stack, else to the parent.
    Previous,
    /// Switch to a neighbouring branch.
    Sibling(SiblingDirection),
}

/// Anything a [`GestureNavigator`](crate::GestureNavigator) can drive.
pub trait NavigationTarget {
    /// Apply one navigation step.
    ///
    /// # Errors
    ///
    /// Structural errors from the underlying history. A
    /// [`HistoryError::NodeNotFound`] means "stay put".
    fn navigate(&mut self, intent: NavigationIntent) -> HistoryResult<StepOutcome>;
}

/// Current position plus a bounded recency stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationCursor {
    current: NodeId,
    recency: VecDeque<NodeId>,
    capacity: usize,
}

impl NavigationCursor {
    /// Create a cursor at the graph's root.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] if the graph has no root.
    pub fn new(graph: &HistoryGraph) -> HistoryResult<Self> {
        Self::with_capacity(graph, DEFAULT_RECENCY_CAPACITY)
    }

    /// Create a cursor at the root with a custom recency capacity.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] if the graph has no root.
    pub fn with_capacity(graph: &HistoryGraph, capacity: usize) -> HistoryResult<Self> {
        let root = graph.root_id().ok_or(HistoryError::NotInitialized)?;
        Ok(Self {
            current: root,
            recency: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// The node the user is on.
    #[must_use]
    pub const fn current(&self) -> NodeId {
        self.current
    }

    /// Recency stack capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Previously visited nodes, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<NodeId> {
        self.recency.iter().copied().collect()
    }

    /// Move to an arbitrary node, remembering where we were.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist; the
    /// cursor does not move.
    pub fn jump_to(&mut self, graph: &HistoryGraph, id: NodeId) -> HistoryResult<()> {
        if !graph.contains(id) {
            return Err(HistoryError::NodeNotFound(id));
        }
        self.move_to(id);
        Ok(())
    }

    /// Move to the first (earliest-created) child.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the current node vanished.
    pub fn step_next(&mut self, graph: &HistoryGraph) -> HistoryResult<StepOutcome> {
        match graph.children(self.current)?.first() {
            Some(&child) => {
                self.move_to(child);
                Ok(StepOutcome::Moved(child))
            }
            None => Ok(StepOutcome::AtLeaf),
        }
    }

    /// Go back to the most recently visited node, else to the parent.
    ///
    /// Recency entries that no longer exist in the graph are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the current node vanished and
    /// the recency stack is empty.
    pub fn step_previous(&mut self, graph: &HistoryGraph) -> HistoryResult<StepOutcome> {
        while let Some(previous) = self.recency.pop_back() {
            if graph.contains(previous) {
                self.current = previous;
                return Ok(StepOutcome::Moved(previous));
            }
            tracing::warn!(node = %previous, "Dropping stale recency entry");
        }

        match graph.get_node(self.current)?.parent_id() {
            Some(parent) => {
                self.current = parent;
                Ok(StepOutcome::Moved(parent))
            }
            None => Ok(StepOutcome::AtRoot),
        }
    }

    /// Switch to a neighbouring branch (a sibling in creation order).
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the current node vanished.
    pub fn step_sibling(
        &mut self,
        graph: &HistoryGraph,
        direction: SiblingDirection,
    ) -> HistoryResult<StepOutcome> {
        let siblings = graph.siblings(self.current)?;
        let Some(index) = siblings.iter().position(|&id| id == self.current) else {
            return Err(HistoryError::NodeNotFound(self.current));
        };
        let target = match direction {
            SiblingDirection::Next => siblings.get(index + 1),
            SiblingDirection::Previous => index.checked_sub(1).and_then(|i| siblings.get(i)),
        };
        match target {
            Some(&id) => {
                self.move_to(id);
                Ok(StepOutcome::Moved(id))
            }
            None => Ok(StepOutcome::NoSibling),
        }
    }

    /// Dispatch a navigation intent.
    ///
    /// # Errors
    ///
    /// Same as the step method the intent maps to.
    pub fn apply(
        &mut self,
        graph: &HistoryGraph,
        intent: NavigationIntent,
    ) -> HistoryResult<StepOutcome> {
        let outcome = match intent {
            NavigationIntent::Next => self.step_next(graph),
            NavigationIntent::Previous => self.step_previous(graph),
            NavigationIntent::Sibling(direction) => self.step_sibling(graph, direction),
        }?;
        tracing::debug!(?intent, ?outcome, "Navigation step");
        Ok(outcome)
    }

    /// Return to the root and forget the recency stack.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] if the graph has no root.
    pub fn reset(&mut self, graph: &HistoryGraph) -> HistoryResult<()> {
        self.current = graph.root_id().ok_or(HistoryError::NotInitialized)?;
        self.recency.clear();
        Ok(())
    }

    /// Bind this cursor to its graph so it can be driven as a
    /// [`NavigationTarget`].
    pub fn bind<'a>(&'a mut self, graph: &'a HistoryGraph) -> BoundCursor<'a> {
        BoundCursor {
            cursor: self,
            graph,
        }
    }

    fn move_to(&mut self, id: NodeId) {
        if self.capacity > 0 {
            if self.recency.len() >= self.capacity {
                self.recency.pop_front();
            }
            self.recency.push_back(self.current);
        }
        self.current = id;
    }
}

/// A cursor borrowed together with the graph it walks.
#[derive(Debug)]
pub struct BoundCursor<'a> {
    cursor: &'a mut NavigationCursor,
    graph: &'a HistoryGraph,
}

impl NavigationTarget for BoundCursor<'_> {
    fn navigate(&mut self, intent: NavigationIntent) -> HistoryResult<StepOutcome> {
        self.cursor.apply(self.graph, intent)
    }
}
