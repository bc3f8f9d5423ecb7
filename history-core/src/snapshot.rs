//! Opaque canvas snapshot storage.
//!
//! The history core never looks inside a snapshot. The canvas subsystem hands
//! over a serialized payload, the store returns a [`SnapshotId`], and history
//! nodes only ever hold that id.
//!
//! Ids are content-addressed (UUID v5 over the payload bytes), so putting the
//! same payload twice yields the same id and stores it once.

use std::collections::{BTreeMap, HashMap};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{HistoryError, HistoryResult};

/// Namespace for content-addressed snapshot ids.
const SNAPSHOT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1c_52e0_9f3b_4d7e_8c21_3b5f_a4d9_0e17);

/// Identifier of a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Derive the content address of a payload.
    #[must_use]
    pub fn for_payload(bytes: &[u8]) -> Self {
        Self(Uuid::new_v5(&SNAPSHOT_NAMESPACE, bytes))
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a snapshot id from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque serialized canvas state.
///
/// Serialized as a base64 string so bundles stay valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Snapshot(Vec<u8>);

impl Snapshot {
    /// Wrap raw payload bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the snapshot, returning the payload bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty (a blank canvas may serialize to nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Content address of this payload.
    #[must_use]
    pub fn id(&self) -> SnapshotId {
        SnapshotId::for_payload(&self.0)
    }
}

impl From<Vec<u8>> for Snapshot {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Snapshot {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<String> for Snapshot {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&str> for Snapshot {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Snapshot payloads keyed by id, as bundled alongside a graph export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotBundle(BTreeMap<SnapshotId, Snapshot>);

impl SnapshotBundle {
    /// Number of payloads in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether the bundle carries a payload for `id`.
    #[must_use]
    pub fn contains(&self, id: SnapshotId) -> bool {
        self.0.contains_key(&id)
    }

    /// Get a payload by id.
    #[must_use]
    pub fn get(&self, id: SnapshotId) -> Option<&Snapshot> {
        self.0.get(&id)
    }

    /// Insert a payload under its content address.
    pub fn insert(&mut self, snapshot: Snapshot) -> SnapshotId {
        let id = snapshot.id();
        self.0.insert(id, snapshot);
        id
    }

    /// Iterate over bundled ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = SnapshotId> + '_ {
        self.0.keys().copied()
    }

    /// Check that every payload hashes to the id it is filed under.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidImport`] naming the first mismatch.
    pub fn verify(&self) -> HistoryResult<()> {
        for (id, snapshot) in &self.0 {
            if snapshot.id() != *id {
                return Err(HistoryError::InvalidImport(format!(
                    "snapshot {id} does not match its content"
                )));
            }
        }
        Ok(())
    }
}

/// Content-addressed snapshot storage.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<SnapshotId, Snapshot>,
}

impl SnapshotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a bundle after verifying its content addresses.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidImport`] if any payload does not match
    /// its id.
    pub fn from_bundle(bundle: SnapshotBundle) -> HistoryResult<Self> {
        bundle.verify()?;
        Ok(Self {
            snapshots: bundle.0.into_iter().collect(),
        })
    }

    /// Store a payload and return its id.
    pub fn put(&mut self, payload: impl Into<Snapshot>) -> SnapshotId {
        let snapshot = payload.into();
        let id = snapshot.id();
        self.snapshots.entry(id).or_insert(snapshot);
        id
    }

    /// Get a payload by id.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::SnapshotNotFound`] if nothing is stored under `id`.
    pub fn get(&self, id: SnapshotId) -> HistoryResult<&Snapshot> {
        self.snapshots
            .get(&id)
            .ok_or(HistoryError::SnapshotNotFound(id))
    }

    /// Check whether a payload is stored under `id`.
    #[must_use]
    pub fn contains(&self, id: SnapshotId) -> bool {
        self.snapshots.contains_key(&id)
    }

    /// Number of distinct payloads stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drop every payload.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Collect the payloads for `ids` into a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::SnapshotNotFound`] for the first missing id.
    pub fn bundle(&self, ids: impl IntoIterator<Item = SnapshotId>) -> HistoryResult<SnapshotBundle> {
        let mut bundle = BTreeMap::new();
        for id in ids {
            let snapshot = self.get(id)?;
            bundle.insert(id, snapshot.clone());
        }
        Ok(SnapshotBundle(bundle))
    }
}
