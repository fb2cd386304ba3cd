//! Graph persistence model.
//!
//! The serialized form is JSON-safe and byte-stable: bindings keyed by
//! `"b<N>"`, tags as sorted string lists, edges in insertion order.
//! Restoring advances the id counter to `max(existing) + 1` so later
//! allocations never collide, and rebuilds the semantic index from graph
//! contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use capra_core::BindingId;

use crate::binding::Binding;
use crate::error::{GraphError, GraphResult};
use crate::graph::{MemoryMode, WorldGraph};

/// On-disk graph snapshot format version.
const SNAPSHOT_VERSION: &str = "0.1";

/// Serializable image of a [`WorldGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub bindings: BTreeMap<BindingId, Binding>,
    pub anchors: BTreeMap<String, BindingId>,
    pub latest: Option<BindingId>,
    pub memory_mode: String,
    pub version: String,
}

impl WorldGraph {
    /// Serialize the whole graph for autosave.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            bindings: self.bindings.iter().map(|(k, v)| (*k, v.clone())).collect(),
            anchors: self.anchors.clone(),
            latest: self.latest,
            memory_mode: self.memory_mode.as_str().to_owned(),
            version: SNAPSHOT_VERSION.to_owned(),
        }
    }

    /// Restore a graph from a snapshot.
    ///
    /// Ids embedded in bindings win over map keys being trusted blindly: a
    /// mismatch between a map key and its binding's own id is corruption.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> GraphResult<WorldGraph> {
        let memory_mode = MemoryMode::parse(&snapshot.memory_mode)?;
        let mut graph = WorldGraph::with_memory_mode(memory_mode);

        let mut max_id: u32 = 0;
        for (key, binding) in snapshot.bindings {
            if key != binding.id {
                return Err(GraphError::Corrupt(format!(
                    "binding map key {key} disagrees with binding id {}",
                    binding.id
                )));
            }
            max_id = max_id.max(binding.id.number());
            graph.bindings.insert(binding.id, binding);
        }

        graph.anchors = snapshot.anchors;
        graph.latest = snapshot.latest;
        graph.next_id = max_id + 1;
        graph.rebuild_semantic_index();
        Ok(graph)
    }

    /// JSON string form of [`to_snapshot`](Self::to_snapshot).
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_snapshot()).unwrap_or_default()
    }

    /// Parse a graph from its JSON snapshot form.
    pub fn from_json(json: &str) -> GraphResult<WorldGraph> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)
            .map_err(|e| GraphError::Corrupt(format!("unreadable snapshot: {e}")))?;
        Self::from_snapshot(snapshot)
    }
}
