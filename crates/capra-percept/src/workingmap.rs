//! WorkingMap — the per-tick scratch graph and MapSurface SELF.
//!
//! The working map holds entity bindings keyed by an `entity_id` (`self`,
//! `mom`, `cliff`, …) plus a schematic SELF binding that carries the
//! grid-derived slot families.  It is scratch state: the runtime may prune
//! it freely and nothing in it is authoritative for the long-term record.

use std::collections::BTreeMap;

use serde_json::json;

use capra_core::BindingId;
use capra_graph::{Meta, Tag, WorldGraph};
use capra_grid::SlotFamilies;

/// Slot-family prefixes owned by the grid derivation on SELF.  Writes
/// overwrite exactly these families and preserve everything else.
const SELF_FAMILY_PREFIXES: [&str; 3] = ["hazard:", "terrain:", "goal:dir:"];

/// An unresolved perception ambiguity parked for the probe side-loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchItem {
    /// Stable ambiguity key, e.g. `navpatch:cliff`.
    pub key: String,
    pub note: String,
}

/// Per-tick scratch world.
pub struct WorkingMap {
    graph: WorldGraph,
    entities: BTreeMap<String, BindingId>,
    scratch: Vec<ScratchItem>,
}

impl Default for WorkingMap {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingMap {
    pub fn new() -> Self {
        WorkingMap {
            graph: WorldGraph::new(),
            entities: BTreeMap::new(),
            scratch: Vec::new(),
        }
    }

    // ── Entities ──────────────────────────────────────────────────────────

    /// The SELF binding, created on first use.
    pub fn ensure_self(&mut self) -> BindingId {
        self.ensure_entity("self")
    }

    /// Entity binding for `entity_id`, created on first use.
    pub fn ensure_entity(&mut self, entity_id: &str) -> BindingId {
        if let Some(&bid) = self.entities.get(entity_id) {
            if self.graph.contains(bid) {
                return bid;
            }
        }
        let bid = self.graph.add_binding(
            Default::default(),
            Meta::from([("entity_id".to_owned(), json!(entity_id))]),
            Default::default(),
        );
        self.entities.insert(entity_id.to_owned(), bid);
        bid
    }

    pub fn entity(&self, entity_id: &str) -> Option<BindingId> {
        self.entities
            .get(entity_id)
            .copied()
            .filter(|bid| self.graph.contains(*bid))
    }

    pub fn entity_ids(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    /// Set the entity's position meta (`pos: [x, y]`).
    pub fn set_entity_pos(&mut self, entity_id: &str, x: f64, y: f64) {
        let bid = self.ensure_entity(entity_id);
        if let Some(b) = self.graph.binding_mut(bid) {
            b.meta.insert("pos".to_owned(), json!([x, y]));
        }
    }

    /// Add a predicate tag to an entity.
    pub fn add_entity_pred(&mut self, entity_id: &str, token: &str) {
        let bid = self.ensure_entity(entity_id);
        if let Some(b) = self.graph.binding_mut(bid) {
            b.tags.insert(Tag::pred(token));
        }
    }

    /// Add a cue tag to an entity.  Only live observation mirroring calls
    /// this — merged priors must never write cues into the WM.
    pub fn add_entity_cue(&mut self, entity_id: &str, token: &str) {
        let bid = self.ensure_entity(entity_id);
        if let Some(b) = self.graph.binding_mut(bid) {
            b.tags.insert(Tag::cue(token));
        }
    }

    /// Predicate tokens currently on an entity.
    pub fn entity_preds(&self, entity_id: &str) -> Vec<String> {
        let Some(bid) = self.entity(entity_id) else { return Vec::new() };
        let Some(b) = self.graph.binding(bid) else { return Vec::new() };
        b.tags
            .iter()
            .filter(|t| t.is_pred())
            .map(|t| t.local().to_owned())
            .collect()
    }

    /// Drop every predicate tag from an entity (replace-mode retrieval
    /// clears the slate before a prior is applied).
    pub fn clear_entity_preds(&mut self, entity_id: &str) {
        let Some(bid) = self.entity(entity_id) else { return };
        if let Some(b) = self.graph.binding_mut(bid) {
            b.tags.retain(|t| !t.is_pred());
        }
    }

    /// `true` when the entity already carries some value in the slot
    /// family of `token` (same prefix up to the last `:` segment).
    pub fn entity_has_family(&self, entity_id: &str, token: &str) -> bool {
        let family = family_of(token);
        self.entity_preds(entity_id)
            .iter()
            .any(|t| family_of(t) == family)
    }

    // ── MapSurface SELF slot families ─────────────────────────────────────

    /// Overwrite the grid-derived slot families on SELF.
    ///
    /// Only the owned family prefixes are touched; unrelated tags are
    /// preserved.  Booleans encode as tag presence and derived facts never
    /// create cues.
    pub fn write_slot_families(&mut self, fams: &SlotFamilies) {
        let self_id = self.ensure_self();
        let Some(b) = self.graph.binding_mut(self_id) else { return };

        b.tags.retain(|t| match t {
            Tag::Pred(local) => !SELF_FAMILY_PREFIXES.iter().any(|p| local.starts_with(p)),
            _ => true,
        });

        if fams.hazard_near {
            b.tags.insert(Tag::pred("hazard:near"));
        }
        if fams.traversable_near {
            b.tags.insert(Tag::pred("terrain:traversable_near"));
        }
        if let Some(dir) = fams.goal_dir {
            b.tags.insert(Tag::pred(&format!("goal:dir:{dir}")));
        }
    }

    // ── Scratch (ambiguity items) ─────────────────────────────────────────

    /// Park an ambiguity for the probe side-loop; idempotent per key.
    pub fn push_scratch(&mut self, key: &str, note: &str) {
        if self.scratch.iter().any(|s| s.key == key) {
            return;
        }
        self.scratch.push(ScratchItem { key: key.to_owned(), note: note.to_owned() });
    }

    pub fn scratch(&self) -> &[ScratchItem] {
        &self.scratch
    }

    pub fn clear_scratch(&mut self) {
        self.scratch.clear();
    }

    /// Drop an ambiguity once resolved.
    pub fn resolve_scratch(&mut self, key: &str) -> bool {
        let before = self.scratch.len();
        self.scratch.retain(|s| s.key != key);
        before != self.scratch.len()
    }

    // ── Graph access ──────────────────────────────────────────────────────

    pub fn graph(&self) -> &WorldGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut WorldGraph {
        &mut self.graph
    }
}

/// Slot-family prefix of a token: everything up to the last `:` segment
/// (`hazard:cliff:near` → `hazard:cliff`); single-segment tokens are their
/// own family.
pub fn family_of(token: &str) -> &str {
    match token.rsplit_once(':') {
        Some((prefix, _)) => prefix,
        None => token,
    }
}
