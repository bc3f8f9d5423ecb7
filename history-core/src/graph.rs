//! # History Graph
//!
//! The branching edit history. Every user edit and AI variation becomes a
//! node whose single parent is the state it was derived from, so the graph is
//! a tree and no creative path is ever overwritten.
//!
//! ```text
//!            root
//!           /    \
//!        edit    ai: "brighten"
//!         |          \
//!        edit      ai: "warmer"
//! ```
//!
//! ## Invariants
//!
//! 1. Exactly one node (the root) has no parent; every other parent exists.
//! 2. `child_ids` of a node lists exactly the nodes whose parent it is, in
//!    creation order.
//! 3. Depth (root = 0) never exceeds [`GraphConfig::max_depth`].
//! 4. Nodes are never removed individually; only [`HistoryGraph::reset`] and
//!    [`HistoryGraph::import_graph`] replace the whole graph.
//!
//! Nodes built through [`HistoryGraph::create_root`] and
//! [`HistoryGraph::create_child`] cannot form a cycle. Imported data can, so
//! [`HistoryGraph::import_graph`] checks for cycles and orphans before
//! touching state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::node::{HistoryNode, NodeId, NodeMetadata, NodeSource, StoredNode};
use crate::snapshot::SnapshotId;
use crate::{HistoryError, HistoryResult};

/// Default maximum depth from the root.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Configuration for a history graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Maximum depth of any node (the root has depth 0).
    pub max_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Serialized shape of a whole graph, used for export and import.
///
/// Snapshot payloads are not included; bundle them separately with
/// [`SnapshotStore::bundle`](crate::SnapshotStore::bundle).
///
/// Node records may omit `id`; it is taken from the map key. A record whose
/// `id` disagrees with its key fails to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredGraph")]
pub struct GraphExport {
    /// The root node.
    pub root_id: NodeId,
    /// All nodes keyed by id.
    pub nodes: BTreeMap<NodeId, HistoryNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredGraph {
    root_id: NodeId,
    #[serde(default)]
    nodes: BTreeMap<NodeId, StoredNode>,
}

impl TryFrom<StoredGraph> for GraphExport {
    type Error = String;

    fn try_from(stored: StoredGraph) -> Result<Self, Self::Error> {
        let nodes = stored
            .nodes
            .into_iter()
            .map(|(key, record)| record.into_node(key).map(|node| (key, node)))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            root_id: stored.root_id,
            nodes,
        })
    }
}

impl GraphExport {
    /// Run the cycle/orphan check over raw export data.
    ///
    /// Useful for diagnosing a payload that [`HistoryGraph::import_graph`]
    /// rejected.
    #[must_use]
    pub fn detect_cycles(&self) -> bool {
        find_cycle(self.root_id, self.nodes.keys().copied(), |id| {
            self.nodes.get(&id)
        })
        .is_some()
    }

    /// Distinct snapshot ids referenced by the nodes.
    #[must_use]
    pub fn snapshot_ids(&self) -> BTreeSet<SnapshotId> {
        self.nodes.values().map(|n| n.snapshot_id).collect()
    }

    /// Serialize for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> HistoryResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize persisted data. Structural validation happens on import.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the export shape.
    pub fn from_json(json: &str) -> HistoryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The canonical store of history nodes.
#[derive(Debug, Clone, Default)]
pub struct HistoryGraph {
    nodes: HashMap<NodeId, HistoryNode>,
    root_id: Option<NodeId>,
    config: GraphConfig,
}

impl HistoryGraph {
    /// Create an empty graph with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph with custom configuration.
    #[must_use]
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            root_id: None,
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Create the root node.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::AlreadyInitialized`] if a root exists.
    pub fn create_root(
        &mut self,
        snapshot_id: SnapshotId,
        metadata: NodeMetadata,
    ) -> HistoryResult<NodeId> {
        if self.root_id.is_some() {
            return Err(HistoryError::AlreadyInitialized);
        }
        let node = HistoryNode::new(
            None,
            snapshot_id,
            NodeSource::UserEdit,
            String::new(),
            1.0,
            metadata,
        );
        let id = node.id;
        self.nodes.insert(id, node);
        self.root_id = Some(id);
        tracing::debug!(node = %id, snapshot = %snapshot_id, "Created history root");
        Ok(id)
    }

    /// Create a node derived from `parent_id`.
    ///
    /// User edits always record a confidence of 1.0 once the supplied value
    /// has passed the range check.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::ParentNotFound`] if the parent does not exist.
    /// - [`HistoryError::InvalidConfidence`] if `confidence` is outside `[0, 1]`.
    /// - [`HistoryError::DepthExceeded`] if the child would exceed the max depth.
    pub fn create_child(
        &mut self,
        parent_id: NodeId,
        snapshot_id: SnapshotId,
        source: NodeSource,
        prompt: impl Into<String>,
        confidence: f32,
        metadata: NodeMetadata,
    ) -> HistoryResult<NodeId> {
        if !self.nodes.contains_key(&parent_id) {
            return Err(HistoryError::ParentNotFound(parent_id));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(HistoryError::InvalidConfidence(confidence));
        }
        let depth = self.depth(parent_id)? + 1;
        if depth > self.config.max_depth {
            return Err(HistoryError::DepthExceeded {
                depth,
                max: self.config.max_depth,
            });
        }

        let confidence = if source == NodeSource::UserEdit {
            1.0
        } else {
            confidence
        };
        let node = HistoryNode::new(
            Some(parent_id),
            snapshot_id,
            source,
            prompt.into(),
            confidence,
            metadata,
        );
        let id = node.id;
        self.nodes.insert(id, node);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.child_ids.push(id);
        }
        tracing::debug!(node = %id, parent = %parent_id, %source, depth, "Created history node");
        Ok(id)
    }

    /// Get a node by ID.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist.
    pub fn get_node(&self, id: NodeId) -> HistoryResult<&HistoryNode> {
        self.nodes.get(&id).ok_or(HistoryError::NodeNotFound(id))
    }

    /// Path from the root to `id`, root first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if `id` (or an ancestor) is
    /// missing, and [`HistoryError::CycleDetected`] if the parent chain loops.
    pub fn get_path_to_root(&self, id: NodeId) -> HistoryResult<Vec<NodeId>> {
        let mut node = self.get_node(id)?;
        let mut path = vec![node.id];
        while let Some(parent_id) = node.parent_id {
            if path.len() > self.nodes.len() {
                return Err(HistoryError::CycleDetected(id));
            }
            node = self.get_node(parent_id)?;
            path.push(parent_id);
        }
        path.reverse();
        Ok(path)
    }

    /// Depth of a node (the root has depth 0).
    ///
    /// # Errors
    ///
    /// Same as [`get_path_to_root`](Self::get_path_to_root).
    pub fn depth(&self, id: NodeId) -> HistoryResult<usize> {
        Ok(self.get_path_to_root(id)?.len() - 1)
    }

    /// All nodes keyed by id. Iteration order carries no meaning.
    #[must_use]
    pub fn get_all_nodes(&self) -> &HashMap<NodeId, HistoryNode> {
        &self.nodes
    }

    /// Node ids root first, every node after all of its ancestors.
    ///
    /// Breadth-first over `child_ids`, so siblings keep creation order.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::CycleDetected`] if a node is reached twice or
    /// before its parent, and [`HistoryError::NodeNotFound`] for a dangling
    /// child link.
    pub fn topological_order(&self) -> HistoryResult<Vec<NodeId>> {
        let Some(root_id) = self.root_id else {
            return Ok(Vec::new());
        };
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([root_id]);

        while let Some(id) = queue.pop_front() {
            let node = self.get_node(id)?;
            if let Some(parent_id) = node.parent_id {
                if !visited.contains(&parent_id) {
                    return Err(HistoryError::CycleDetected(id));
                }
            }
            if !visited.insert(id) {
                return Err(HistoryError::CycleDetected(id));
            }
            order.push(id);
            queue.extend(node.child_ids.iter().copied());
        }
        Ok(order)
    }

    /// Whether any node is unreachable from the root or sits on a looping
    /// parent chain.
    #[must_use]
    pub fn detect_cycles(&self) -> bool {
        match self.root_id {
            Some(root_id) => {
                find_cycle(root_id, self.nodes.keys().copied(), |id| self.nodes.get(&id))
                    .is_some()
            }
            None => !self.nodes.is_empty(),
        }
    }

    /// Snapshot of the current structure.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] if the graph has no root.
    pub fn export_graph(&self) -> HistoryResult<GraphExport> {
        let root_id = self.root_id.ok_or(HistoryError::NotInitialized)?;
        Ok(GraphExport {
            root_id,
            nodes: self
                .nodes
                .iter()
                .map(|(id, node)| (*id, node.clone()))
                .collect(),
        })
    }

    /// Replace the whole graph with validated data.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidImport`] describing the first violated
    /// invariant. The current graph is left untouched on failure.
    pub fn import_graph(&mut self, data: GraphExport) -> HistoryResult<()> {
        validate_export(&data, self.config.max_depth).map_err(HistoryError::InvalidImport)?;

        let count = data.nodes.len();
        self.nodes = data.nodes.into_iter().collect();
        self.root_id = Some(data.root_id);
        tracing::info!(root = %data.root_id, nodes = count, "Imported history graph");
        Ok(())
    }

    /// Drop every node.
    pub fn reset(&mut self) {
        let count = self.nodes.len();
        self.nodes.clear();
        self.root_id = None;
        tracing::info!(nodes = count, "Reset history graph");
    }

    /// Update a node's metadata. Structural fields are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist.
    pub fn update_metadata<F>(&mut self, id: NodeId, f: F) -> HistoryResult<()>
    where
        F: FnOnce(&mut NodeMetadata),
    {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(HistoryError::NodeNotFound(id))?;
        f(&mut node.metadata);
        Ok(())
    }

    /// The root node id, if any.
    #[must_use]
    pub const fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Children of a node in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node does not exist.
    pub fn children(&self, id: NodeId) -> HistoryResult<&[NodeId]> {
        Ok(self.get_node(id)?.child_ids())
    }

    /// The node and its siblings in creation order. The root is its own only
    /// sibling.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NodeNotFound`] if the node or its parent is
    /// missing.
    pub fn siblings(&self, id: NodeId) -> HistoryResult<&[NodeId]> {
        let node = self.get_node(id)?;
        match node.parent_id {
            Some(parent_id) => self.children(parent_id),
            None => Ok(std::slice::from_ref(&node.id)),
        }
    }

    /// Nodes without children.
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_leaf())
            .map(HistoryNode::id)
            .collect()
    }

    /// Distinct snapshot ids referenced by the graph.
    #[must_use]
    pub fn snapshot_ids(&self) -> BTreeSet<SnapshotId> {
        self.nodes.values().map(|n| n.snapshot_id).collect()
    }

    /// Check whether a node exists.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Find a node that is unreachable from the root, reached twice, or sits on a
/// parent chain that loops or ends somewhere other than the root.
fn find_cycle<'a, F>(
    root_id: NodeId,
    ids: impl Iterator<Item = NodeId>,
    lookup: F,
) -> Option<NodeId>
where
    F: Fn(NodeId) -> Option<&'a HistoryNode>,
{
    let Some(root) = lookup(root_id) else {
        return Some(root_id);
    };

    let mut reachable = HashSet::from([root_id]);
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        for &child_id in &node.child_ids {
            if !reachable.insert(child_id) {
                return Some(child_id);
            }
            match lookup(child_id) {
                Some(child) => queue.push_back(child),
                None => return Some(child_id),
            }
        }
    }

    for id in ids {
        if !reachable.contains(&id) {
            return Some(id);
        }
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return Some(current);
            }
            match lookup(current).map(HistoryNode::parent_id) {
                Some(Some(parent_id)) => current = parent_id,
                Some(None) if current == root_id => break,
                Some(None) | None => return Some(current),
            }
        }
    }
    None
}

/// Check every graph invariant on import data.
fn validate_export(data: &GraphExport, max_depth: usize) -> Result<(), String> {
    if data.nodes.is_empty() {
        return Err("graph has no nodes".into());
    }
    if !data.nodes.contains_key(&data.root_id) {
        return Err(format!("root {} is not among the nodes", data.root_id));
    }

    for (key, node) in &data.nodes {
        if *key != node.id {
            return Err(format!("node filed under {key} has id {}", node.id));
        }
        if !(0.0..=1.0).contains(&node.confidence) {
            return Err(format!(
                "node {key} has confidence {} outside [0, 1]",
                node.confidence
            ));
        }
        match node.parent_id {
            None if *key != data.root_id => {
                return Err(format!("node {key} has no parent but is not the root"));
            }
            Some(_) if *key == data.root_id => {
                return Err(format!("root {key} has a parent"));
            }
            Some(parent_id) => {
                let parent = data
                    .nodes
                    .get(&parent_id)
                    .ok_or_else(|| format!("node {key} references missing parent {parent_id}"))?;
                if !parent.child_ids.contains(key) {
                    return Err(format!("parent {parent_id} does not list child {key}"));
                }
            }
            None => {}
        }

        let mut seen = HashSet::with_capacity(node.child_ids.len());
        for child_id in &node.child_ids {
            if !seen.insert(*child_id) {
                return Err(format!("node {key} lists child {child_id} twice"));
            }
            let child = data
                .nodes
                .get(child_id)
                .ok_or_else(|| format!("node {key} lists missing child {child_id}"))?;
            if child.parent_id != Some(*key) {
                return Err(format!("child {child_id} does not point back to {key}"));
            }
        }
    }

    if let Some(id) = find_cycle(data.root_id, data.nodes.keys().copied(), |id| {
        data.nodes.get(&id)
    }) {
        return Err(format!("cycle or orphan at node {id}"));
    }

    let mut queue = VecDeque::from([(data.root_id, 0_usize)]);
    while let Some((id, depth)) = queue.pop_front() {
        if depth > max_depth {
            return Err(format!("node {id} at depth {depth} exceeds maximum {max_depth}"));
        }
        if let Some(node) = data.nodes.get(&id) {
            queue.extend(node.child_ids.iter().map(|c| (*c, depth + 1)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(label: &str) -> SnapshotId {
        SnapshotId::for_payload(label.as_bytes())
    }

    fn graph_with_root() -> (HistoryGraph, NodeId) {
        let mut graph = HistoryGraph::new();
        let root = graph
            .create_root(snap("root"), NodeMetadata::default())
            .expect("root");
        (graph, root)
    }

    fn child(graph: &mut HistoryGraph, parent: NodeId, label: &str) -> NodeId {
        graph
            .create_child(
                parent,
                snap(label),
                NodeSource::UserEdit,
                "",
                1.0,
                NodeMetadata::default(),
            )
            .expect("child")
    }

    #[test]
    fn test_create_root() {
        let (graph, root) = graph_with_root();
        let node = graph.get_node(root).expect("root exists");
        assert!(node.is_root());
        assert_eq!(graph.root_id(), Some(root));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_create_root_twice_fails() {
        let (mut graph, _) = graph_with_root();
        let result = graph.create_root(snap("again"), NodeMetadata::default());
        assert!(matches!(result, Err(HistoryError::AlreadyInitialized)));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_children_keep_creation_order() {
        let (mut graph, root) = graph_with_root();
        let c1 = child(&mut graph, root, "c1");
        let c2 = graph
            .create_child(
                root,
                snap("c2"),
                NodeSource::AiSuggestion,
                "brighten",
                0.9,
                NodeMetadata::default(),
            )
            .expect("c2");
        assert_eq!(graph.children(root).expect("children"), &[c1, c2]);

        let node = graph.get_node(c2).expect("c2");
        assert_eq!(node.prompt(), "brighten");
        assert!((node.confidence() - 0.9).abs() < f32::EPSILON);
        assert_eq!(node.parent_id(), Some(root));
    }

    #[test]
    fn test_create_child_missing_parent() {
        let (mut graph, _) = graph_with_root();
        let missing = NodeId::new();
        let result = graph.create_child(
            missing,
            snap("x"),
            NodeSource::UserEdit,
            "",
            1.0,
            NodeMetadata::default(),
        );
        assert!(matches!(result, Err(HistoryError::ParentNotFound(id)) if id == missing));
    }

    #[test]
    fn test_create_child_rejects_bad_confidence() {
        let (mut graph, root) = graph_with_root();
        for bad in [-0.1_f32, 1.5, f32::NAN] {
            let result = graph.create_child(
                root,
                snap("x"),
                NodeSource::AiCreative,
                "wild",
                bad,
                NodeMetadata::default(),
            );
            assert!(matches!(result, Err(HistoryError::InvalidConfidence(_))));
        }
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_user_edit_confidence_is_one() {
        let (mut graph, root) = graph_with_root();
        let id = graph
            .create_child(
                root,
                snap("edit"),
                NodeSource::UserEdit,
                "",
                0.4,
                NodeMetadata::default(),
            )
            .expect("child");
        let node = graph.get_node(id).expect("node");
        assert!((node.confidence() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_depth_limit() {
        let mut graph = HistoryGraph::with_config(GraphConfig { max_depth: 3 });
        let mut tip = graph
            .create_root(snap("root"), NodeMetadata::default())
            .expect("root");
        for i in 0..3 {
            tip = child(&mut graph, tip, &format!("n{i}"));
        }
        assert_eq!(graph.depth(tip).expect("depth"), 3);

        let result = graph.create_child(
            tip,
            snap("too-deep"),
            NodeSource::UserEdit,
            "",
            1.0,
            NodeMetadata::default(),
        );
        assert!(matches!(
            result,
            Err(HistoryError::DepthExceeded { depth: 4, max: 3 })
        ));
    }

    #[test]
    fn test_path_to_root() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let b = child(&mut graph, a, "b");
        let _side = child(&mut graph, root, "side");
        assert_eq!(graph.get_path_to_root(b).expect("path"), vec![root, a, b]);
        assert_eq!(graph.get_path_to_root(root).expect("path"), vec![root]);
    }

    #[test]
    fn test_path_to_root_missing_node() {
        let (graph, _) = graph_with_root();
        assert!(matches!(
            graph.get_path_to_root(NodeId::new()),
            Err(HistoryError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_topological_order_breadth_first() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let b = child(&mut graph, root, "b");
        let a1 = child(&mut graph, a, "a1");
        let b1 = child(&mut graph, b, "b1");
        assert_eq!(
            graph.topological_order().expect("order"),
            vec![root, a, b, a1, b1]
        );
    }

    #[test]
    fn test_topological_order_empty_graph() {
        let graph = HistoryGraph::new();
        assert!(graph.topological_order().expect("order").is_empty());
    }

    #[test]
    fn test_detect_cycles_false_for_built_graph() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        child(&mut graph, a, "b");
        assert!(!graph.detect_cycles());
        assert!(!HistoryGraph::new().detect_cycles());
    }

    #[test]
    fn test_export_requires_root() {
        let graph = HistoryGraph::new();
        assert!(matches!(
            graph.export_graph(),
            Err(HistoryError::NotInitialized)
        ));
    }

    #[test]
    fn test_import_round_trip() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        child(&mut graph, a, "b");
        let export = graph.export_graph().expect("export");

        let mut restored = HistoryGraph::new();
        restored.import_graph(export.clone()).expect("import");
        assert_eq!(
            restored.topological_order().expect("order"),
            graph.topological_order().expect("order")
        );
        assert_eq!(restored.export_graph().expect("export"), export);
    }

    #[test]
    fn test_import_rejects_two_node_cycle() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let b = child(&mut graph, a, "b");
        let mut export = graph.export_graph().expect("export");

        // a <-> b, detached from the root
        export.nodes.get_mut(&root).expect("root").child_ids.clear();
        export.nodes.get_mut(&a).expect("a").parent_id = Some(b);
        export.nodes.get_mut(&b).expect("b").child_ids = vec![a];
        assert!(export.detect_cycles());

        let before = graph.topological_order().expect("order");
        let result = graph.import_graph(export);
        assert!(matches!(result, Err(HistoryError::InvalidImport(_))));
        assert_eq!(graph.topological_order().expect("order"), before);
        assert!(!graph.detect_cycles());
    }

    #[test]
    fn test_import_rejects_second_root() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let mut export = graph.export_graph().expect("export");
        export.nodes.get_mut(&a).expect("a").parent_id = None;
        export.nodes.get_mut(&root).expect("root").child_ids.clear();

        let mut target = HistoryGraph::new();
        assert!(matches!(
            target.import_graph(export),
            Err(HistoryError::InvalidImport(_))
        ));
        assert!(target.is_empty());
    }

    #[test]
    fn test_import_rejects_one_sided_link() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let mut export = graph.export_graph().expect("export");
        export.nodes.get_mut(&root).expect("root").child_ids.clear();
        assert!(export.nodes.contains_key(&a));

        let mut target = HistoryGraph::new();
        let err = target.import_graph(export).expect_err("should reject");
        assert!(err.to_string().contains("does not list child"));
    }

    #[test]
    fn test_import_rejects_too_deep() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        child(&mut graph, a, "b");
        let export = graph.export_graph().expect("export");

        let mut shallow = HistoryGraph::with_config(GraphConfig { max_depth: 1 });
        assert!(matches!(
            shallow.import_graph(export),
            Err(HistoryError::InvalidImport(_))
        ));
    }

    #[test]
    fn test_import_rejects_empty() {
        let mut graph = HistoryGraph::new();
        let export = GraphExport {
            root_id: NodeId::new(),
            nodes: BTreeMap::new(),
        };
        assert!(matches!(
            graph.import_graph(export),
            Err(HistoryError::InvalidImport(_))
        ));
    }

    #[test]
    fn test_update_metadata() {
        let (mut graph, root) = graph_with_root();
        graph
            .update_metadata(root, |m| m.tags.push("hero".into()))
            .expect("update");
        assert_eq!(graph.get_node(root).expect("root").metadata().tags, vec!["hero"]);
        assert!(matches!(
            graph.update_metadata(NodeId::new(), |_| {}),
            Err(HistoryError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_siblings_and_leaves() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let b = child(&mut graph, root, "b");
        assert_eq!(graph.siblings(a).expect("siblings"), &[a, b]);
        assert_eq!(graph.siblings(root).expect("siblings"), &[root]);
        let mut leaves = graph.leaves();
        leaves.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn test_reset_allows_new_root() {
        let (mut graph, _) = graph_with_root();
        graph.reset();
        assert!(graph.is_empty());
        assert!(graph.root_id().is_none());
        graph
            .create_root(snap("fresh"), NodeMetadata::default())
            .expect("new root");
    }

    #[test]
    fn test_export_json_round_trip() {
        let (mut graph, root) = graph_with_root();
        child(&mut graph, root, "a");
        let export = graph.export_graph().expect("export");
        let json = export.to_json().expect("json");
        assert!(json.contains("rootId"));
        let parsed = GraphExport::from_json(&json).expect("parse");
        assert_eq!(parsed, export);
        assert_eq!(parsed.snapshot_ids().len(), 2);
    }

    #[test]
    fn test_import_records_without_ids() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let mut value = serde_json::to_value(graph.export_graph().expect("export")).expect("value");
        for record in value["nodes"].as_object_mut().expect("nodes").values_mut() {
            record.as_object_mut().expect("record").remove("id");
        }

        let export: GraphExport = serde_json::from_value(value).expect("keyed records");
        assert_eq!(export.nodes[&a].id(), a);

        let mut target = HistoryGraph::new();
        target.import_graph(export).expect("import");
        assert_eq!(target.get_node(a).expect("a").parent_id(), Some(root));
    }

    #[test]
    fn test_record_id_must_match_key() {
        let (mut graph, root) = graph_with_root();
        child(&mut graph, root, "a");
        let mut value = serde_json::to_value(graph.export_graph().expect("export")).expect("value");
        value["nodes"][root.to_string()]["id"] = serde_json::json!(NodeId::new());

        let err = GraphExport::from_json(&value.to_string()).expect_err("should reject");
        assert!(err.to_string().contains("filed under"));
    }

    #[test]
    fn test_unknown_metadata_survives_import() {
        let (mut graph, root) = graph_with_root();
        let a = child(&mut graph, root, "a");
        let mut value = serde_json::to_value(graph.export_graph().expect("export")).expect("value");
        value["nodes"][a.to_string()]["metadata"]["rating"] = serde_json::json!(5);

        let mut target = HistoryGraph::new();
        target
            .import_graph(serde_json::from_value(value).expect("export"))
            .expect("import");
        let again = serde_json::to_value(target.export_graph().expect("export")).expect("value");
        assert_eq!(again["nodes"][a.to_string()]["metadata"]["rating"], 5);
    }
}
