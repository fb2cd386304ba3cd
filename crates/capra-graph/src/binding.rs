//! Binding and edge records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use capra_core::{BindingId, EngramId};

use crate::tag::Tag;

/// Free-form provenance/context carried by bindings and edges.
///
/// A `BTreeMap` keeps serialization key-sorted and therefore byte-stable.
pub type Meta = BTreeMap<String, Value>;

// ── EngramRef ─────────────────────────────────────────────────────────────────

/// Pointer from a binding into column memory.  Only the id plus tiny
/// numbers live here; the heavy payload stays in the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngramRef {
    pub id: EngramId,
    /// Activation weight, kept small and human-readable.
    pub act: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl EngramRef {
    pub fn new(id: EngramId) -> Self {
        EngramRef { id, act: 1.0, meta: None }
    }
}

// ── Edge ──────────────────────────────────────────────────────────────────────

/// Directed link to another binding.
///
/// The label carries the action/relation semantics; `then` is the generic
/// weak-causality label.  Meta may hold numeric weights (`weight`, `cost`,
/// `distance`, `duration_s`) read by the Dijkstra planner, plus provenance
/// (`created_by`, `policy`, `source`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub to: BindingId,
    pub label: String,
    #[serde(default)]
    pub meta: Meta,
}

// ── Binding ───────────────────────────────────────────────────────────────────

/// One node in the episode graph.
///
/// Tags serialize as a sorted string list (`Tag`'s ordering equals wire
/// string order); edges keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: BindingId,
    pub tags: BTreeSet<Tag>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub meta: Meta,
    /// Engram pointers keyed by column slot name (e.g. `"column01"`).
    #[serde(default)]
    pub engrams: BTreeMap<String, EngramRef>,
}

impl Binding {
    pub(crate) fn new(id: BindingId, tags: BTreeSet<Tag>, meta: Meta, engrams: BTreeMap<String, EngramRef>) -> Self {
        Binding { id, tags, edges: Vec::new(), meta, engrams }
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// First `pred:*` local token, if any (BTreeSet order, so stable).
    pub fn first_pred(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| match t {
            Tag::Pred(local) => Some(local.as_str()),
            _ => None,
        })
    }

    /// First `cue:*` local token, if any.
    pub fn first_cue(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| match t {
            Tag::Cue(local) => Some(local.as_str()),
            _ => None,
        })
    }

    /// Anchor name when this binding is an anchor.
    pub fn anchor_name(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| match t {
            Tag::Anchor(local) => Some(local.as_str()),
            _ => None,
        })
    }
}
