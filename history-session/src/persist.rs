//! Bundle persistence.
//!
//! A [`HistoryBundle`] carries a graph export and every snapshot payload it
//! references. [`BundleStore`] saves bundles as pretty JSON files in a data
//! directory, one file per session name.

use std::path::{Path, PathBuf};

use history_core::{now_ms, GraphExport, SnapshotBundle};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Current bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

/// A self-contained export of one session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBundle {
    /// Format version.
    pub version: u32,
    /// Export time in milliseconds since the Unix epoch.
    pub exported_at: u64,
    /// The graph structure.
    pub graph: GraphExport,
    /// Snapshot payloads keyed by snapshot id.
    pub snapshots: SnapshotBundle,
}

impl HistoryBundle {
    /// Wrap a graph export and its snapshots, stamped with the current time.
    #[must_use]
    pub fn new(graph: GraphExport, snapshots: SnapshotBundle) -> Self {
        Self {
            version: BUNDLE_VERSION,
            exported_at: now_ms(),
            graph,
            snapshots,
        }
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> SessionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON, rejecting unknown versions.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] for malformed JSON and
    /// [`SessionError::UnsupportedVersion`] for a newer format.
    pub fn from_json(json: &str) -> SessionResult<Self> {
        let bundle: Self = serde_json::from_str(json)?;
        if bundle.version != BUNDLE_VERSION {
            return Err(SessionError::UnsupportedVersion {
                found: bundle.version,
                expected: BUNDLE_VERSION,
            });
        }
        Ok(bundle)
    }

    /// Read a bundle from an arbitrary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn read_from(path: impl AsRef<Path>) -> SessionResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

/// Saved bundles in a data directory.
#[derive(Debug, Clone)]
pub struct BundleStore {
    data_dir: PathBuf,
}

impl BundleStore {
    /// Open a store, creating the directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> SessionResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// The backing directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path a session name is saved under.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.json", sanitize_filename(name)))
    }

    /// Save a bundle under `name`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, name: &str, bundle: &HistoryBundle) -> SessionResult<PathBuf> {
        let path = self.path_for(name);
        std::fs::write(&path, bundle.to_json()?)?;
        tracing::debug!(name, path = %path.display(), "Saved history bundle");
        Ok(path)
    }

    /// Load the bundle saved under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BundleNotFound`] if nothing is saved under
    /// `name`, or an error if the file can't be parsed.
    pub fn load(&self, name: &str) -> SessionResult<HistoryBundle> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(contents) => HistoryBundle::from_json(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionError::BundleNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List saved session names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory can't be read.
    pub fn list(&self) -> SessionResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a saved bundle. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but can't be removed.
    pub fn delete(&self, name: &str) -> SessionResult<bool> {
        let path = self.path_for(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Sanitize a session name for use as a filename.
///
/// Replaces any character that is not alphanumeric, `-`, or `_` with `_`.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
