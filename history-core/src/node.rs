//! History nodes - one recorded state of the design and its provenance.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snapshot::SnapshotId;

/// Unique identifier for a history node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new unique node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a node id from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a node came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeSource {
    /// Direct manipulation by the user.
    UserEdit,
    /// AI suggestion refining the parent.
    AiSuggestion,
    /// Free-form AI creative variation.
    AiCreative,
    /// Imported from outside the session.
    Import,
    /// Explicit branch point created by the user.
    Branch,
}

impl NodeSource {
    /// Whether the node was produced by the AI service.
    #[must_use]
    pub const fn is_ai(self) -> bool {
        matches!(self, Self::AiSuggestion | Self::AiCreative)
    }

    /// Stable tag used in logs and the persisted format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserEdit => "user-edit",
            Self::AiSuggestion => "ai-suggestion",
            Self::AiCreative => "ai-creative",
            Self::Import => "import",
            Self::Branch => "branch",
        }
    }
}

impl std::fmt::Display for NodeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a variation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Not reviewed yet.
    #[default]
    Pending,
    /// Kept by the user.
    Approved,
    /// Dismissed by the user (still kept in history).
    Rejected,
}

/// Mutable annotations attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Review state.
    #[serde(default)]
    pub approval: ApprovalStatus,
    /// Any other keys, kept verbatim through export and import.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NodeMetadata {
    /// Add a tag (builder style).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the notes (builder style).
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// One recorded state of the design.
///
/// Structural fields are read-only outside the crate; only
/// [`HistoryGraph`](crate::HistoryGraph) creates nodes and appends children.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNode {
    pub(crate) id: NodeId,
    pub(crate) parent_id: Option<NodeId>,
    #[serde(default)]
    pub(crate) child_ids: Vec<NodeId>,
    pub(crate) snapshot_id: SnapshotId,
    pub(crate) source: NodeSource,
    #[serde(default)]
    pub(crate) prompt: String,
    pub(crate) confidence: f32,
    pub(crate) created_at: u64,
    #[serde(default)]
    pub(crate) metadata: NodeMetadata,
}

impl HistoryNode {
    pub(crate) fn new(
        parent_id: Option<NodeId>,
        snapshot_id: SnapshotId,
        source: NodeSource,
        prompt: String,
        confidence: f32,
        metadata: NodeMetadata,
    ) -> Self {
        Self {
            id: NodeId::new(),
            parent_id,
            child_ids: Vec::new(),
            snapshot_id,
            source,
            prompt,
            confidence,
            created_at: now_ms(),
            metadata,
        }
    }

    /// Node identifier.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Parent identifier, `None` for the root.
    #[must_use]
    pub const fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    /// Children in creation order.
    #[must_use]
    pub fn child_ids(&self) -> &[NodeId] {
        &self.child_ids
    }

    /// Snapshot holding the canvas state at this node.
    #[must_use]
    pub const fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    /// Provenance tag.
    #[must_use]
    pub const fn source(&self) -> NodeSource {
        self.source
    }

    /// Description of how this node was produced.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Confidence in `[0, 1]`; always 1.0 for user edits.
    #[must_use]
    pub const fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Creation time in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Mutable annotations.
    #[must_use]
    pub const fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    /// Whether this is the root node.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether this node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}

/// A persisted node record. The surrounding map key is authoritative; an
/// `id` inside the record is optional but must agree with it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredNode {
    #[serde(default)]
    id: Option<NodeId>,
    parent_id: Option<NodeId>,
    #[serde(default)]
    child_ids: Vec<NodeId>,
    snapshot_id: SnapshotId,
    source: NodeSource,
    #[serde(default)]
    prompt: String,
    confidence: f32,
    created_at: u64,
    #[serde(default)]
    metadata: NodeMetadata,
}

impl StoredNode {
    pub(crate) fn into_node(self, key: NodeId) -> Result<HistoryNode, String> {
        if let Some(id) = self.id.filter(|id| *id != key) {
            return Err(format!("node filed under {key} has id {id}"));
        }
        Ok(HistoryNode {
            id: key,
            parent_id: self.parent_id,
            child_ids: self.child_ids,
            snapshot_id: self.snapshot_id,
            source: self.source,
            prompt: self.prompt,
            confidence: self.confidence,
            created_at: self.created_at,
            metadata: self.metadata,
        })
    }
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
