//! BodyMap — the proprioception slot graph.
//!
//! A tiny world graph with one binding per body slot.  Each observation
//! overwrites a slot's tags to exactly the observed family values, so the
//! BodyMap always reads as "what the body says right now" — no history, no
//! planning, just fast slot lookups for policy gating and safety checks.

use std::collections::BTreeMap;

use capra_core::{BindingId, Ctx};
use capra_graph::{Meta, Tag, WorldGraph};

use crate::observation::Observation;

/// Slot table: slot name → recognized token prefixes.
///
/// A token matches a slot when it starts with any of the slot's prefixes
/// (exact-token prefixes like `resting` match themselves and any
/// colon-extended form).
const SLOTS: &[(&str, &[&str])] = &[
    ("posture", &["posture:"]),
    ("mom", &["proximity:mom:"]),
    ("shelter", &["proximity:shelter:"]),
    ("cliff", &["hazard:cliff:"]),
    ("nipple", &["nipple:"]),
    ("milk", &["milk:"]),
    ("rest", &["resting", "sleeping:"]),
];

/// Proprioception snapshot as a thin world graph.
pub struct BodyMap {
    graph: WorldGraph,
    slots: BTreeMap<&'static str, BindingId>,
}

impl Default for BodyMap {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyMap {
    /// Build the fixed slot bindings.  Slot bindings start tagless; the
    /// first observation fills them in.
    pub fn new() -> Self {
        let mut graph = WorldGraph::new();
        let mut slots = BTreeMap::new();
        for (name, _) in SLOTS {
            let bid = graph.add_binding(
                Default::default(),
                Meta::from([("slot".to_owned(), serde_json::json!(name))]),
                Default::default(),
            );
            slots.insert(*name, bid);
        }
        BodyMap { graph, slots }
    }

    /// Overwrite slot tags from an observation's predicates and record the
    /// refresh step on `ctx`.
    ///
    /// A slot only changes when the observation mentions its family; an
    /// unmentioned slot keeps its previous value (stable overwrite, no
    /// decay here — staleness is tracked separately).
    pub fn update_from_observation(&mut self, obs: &Observation, ctx: &mut Ctx) {
        for (name, prefixes) in SLOTS {
            let observed: Vec<&String> = obs
                .predicates
                .iter()
                .filter(|t| prefixes.iter().any(|p| t.starts_with(p)))
                .collect();
            if observed.is_empty() {
                continue;
            }
            if let Some(&bid) = self.slots.get(name) {
                if let Some(b) = self.graph.binding_mut(bid) {
                    b.tags.clear();
                    for token in observed {
                        b.tags.insert(Tag::pred(token));
                    }
                }
            }
        }
        ctx.bodymap_last_update_step = Some(ctx.controller_steps);
    }

    /// All family-local tokens currently on a slot.
    pub fn slot_tokens(&self, slot: &str) -> Vec<String> {
        let Some(&bid) = self.slots.get(slot) else { return Vec::new() };
        let Some(b) = self.graph.binding(bid) else { return Vec::new() };
        b.tags
            .iter()
            .filter(|t| t.is_pred())
            .map(|t| t.local().to_owned())
            .collect()
    }

    /// Current posture value (`standing`, `fallen`, …), if observed yet.
    pub fn posture(&self) -> Option<String> {
        self.slot_tokens("posture")
            .into_iter()
            .find_map(|t| t.strip_prefix("posture:").map(str::to_owned))
    }

    pub fn is_fallen(&self) -> bool {
        self.posture().as_deref() == Some("fallen")
    }

    pub fn is_standing(&self) -> bool {
        self.posture().as_deref() == Some("standing")
    }

    /// `true` when the mom proximity slot reads close.
    pub fn mom_close(&self) -> bool {
        self.slot_tokens("mom").iter().any(|t| t == "proximity:mom:close")
    }

    /// Zone derived from hazard/shelter slots: `cliff_edge` near a cliff,
    /// `shelter` near shelter, else `open`.  Used for keyframe zone-change
    /// detection when the environment doesn't name a zone itself.
    pub fn derive_zone(&self) -> String {
        if self.slot_tokens("cliff").iter().any(|t| t == "hazard:cliff:near") {
            return "cliff_edge".to_owned();
        }
        if self.slot_tokens("shelter").iter().any(|t| t == "proximity:shelter:near") {
            return "shelter".to_owned();
        }
        "open".to_owned()
    }

    /// The underlying graph (read-only; snapshots and debug readouts).
    pub fn graph(&self) -> &WorldGraph {
        &self.graph
    }

    /// Slot binding id (tests and safety checks).
    pub fn slot_id(&self, slot: &str) -> Option<BindingId> {
        self.slots.get(slot).copied()
    }
}

// Policies may post a posture expectation for the next tick; keep the
// comparison logic beside the slot that answers it.
impl BodyMap {
    /// Compare a posted posture expectation against the current slot.
    /// Returns the pred-err bit: 1 on mismatch (or nothing observed yet).
    pub fn posture_pred_err(&self, expected: &str) -> u8 {
        match self.posture() {
            Some(actual) if actual == expected => 0,
            _ => 1,
        }
    }
}
