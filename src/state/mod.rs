//! Persisted node visibility.
//!
//! The tree reads this store when it constructs a node (keyed by the node's
//! dotted path) and writes it only through `InspectorTree::save_state`. The
//! file format is a small versioned JSON document.

use crate::error::{InspectError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// Default state filename inside the app data directory
pub const STATE_FILE: &str = "node_state.json";

/// Stored visibility flags of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub self_visible: bool,
    pub children_visible: bool,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            self_visible: true,
            children_visible: false,
        }
    }
}

/// Path-keyed storage of node visibility.
#[cfg_attr(test, mockall::automock)]
pub trait NodeStateStore {
    fn get(&self, path: &str) -> Option<NodeState>;
    fn set(&mut self, path: &str, state: NodeState);
    fn clear(&mut self);
}

/// On-disk form of [`StateStore`].
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    nodes: BTreeMap<String, NodeState>,
}

/// In-memory store with JSON load/save.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    nodes: BTreeMap<String, NodeState>,
    saved_at: Option<DateTime<Utc>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// When the loaded (or last saved) snapshot was written.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeState)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace the whole map with the contents of `path`. A missing file
    /// leaves the store empty.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            tracing::debug!("No node state at {:?}", path);
            self.nodes = BTreeMap::new();
            self.saved_at = None;
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let file: StateFile = serde_json::from_str(&content)
            .map_err(|e| InspectError::Serialization(format!("Failed to parse node state: {}", e)))?;
        if file.version > STATE_VERSION {
            return Err(InspectError::Serialization(format!(
                "Node state version {} is newer than supported version {}",
                file.version, STATE_VERSION
            )));
        }

        self.nodes = file.nodes;
        self.saved_at = file.saved_at;
        tracing::info!("Loaded state of {} nodes from {:?}", self.nodes.len(), path);
        Ok(())
    }

    /// Load from `path`, logging and falling back to an empty store on error.
    pub fn load_or_default(path: &Path) -> Self {
        let mut store = Self::new();
        if let Err(e) = store.load(path) {
            tracing::warn!("Failed to load node state: {}, starting empty", e);
            store = Self::new();
        }
        store
    }

    /// Write a snapshot to `path` (through a temporary file, then renamed).
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let saved_at = Utc::now();
        let file = StateFile {
            version: STATE_VERSION,
            saved_at: Some(saved_at),
            nodes: self.nodes.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        self.saved_at = Some(saved_at);

        tracing::debug!("Saved state of {} nodes to {:?}", self.nodes.len(), path);
        Ok(())
    }
}

impl NodeStateStore for StateStore {
    fn get(&self, path: &str) -> Option<NodeState> {
        self.nodes.get(path).copied()
    }

    fn set(&mut self, path: &str, state: NodeState) {
        self.nodes.insert(path.to_string(), state);
    }

    fn clear(&mut self) {
        self.nodes.clear();
    }
}
