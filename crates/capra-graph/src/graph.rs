//! The `WorldGraph` itself: creation, tagging, edges, anchors, invariants.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use tracing::warn;

use capra_core::BindingId;

use crate::binding::{Binding, Edge, EngramRef, Meta};
use crate::error::{GraphError, GraphResult};
use crate::lexicon::{Stage, TagLexicon, TagPolicy};
use crate::plan::{planner_from_env, Planner};
use crate::tag::{Tag, TagFamily};

/// The generic weak-causality edge label.
pub const THEN: &str = "then";

// ── Modes ─────────────────────────────────────────────────────────────────────

/// How repeated predicate/cue writes are stored.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum MemoryMode {
    /// Every write creates a fresh binding (full episodic trace).
    #[default]
    Episodic,
    /// Identical tags consolidate onto one canonical binding.
    Semantic,
}

impl MemoryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryMode::Episodic => "episodic",
            MemoryMode::Semantic => "semantic",
        }
    }

    pub fn parse(s: &str) -> GraphResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "episodic" => Ok(MemoryMode::Episodic),
            "semantic" => Ok(MemoryMode::Semantic),
            _ => Err(GraphError::UnknownMemoryMode(s.to_owned())),
        }
    }
}

/// Auto-link target for tag writes.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Attach {
    /// No auto-edge.
    #[default]
    None,
    /// `NOW --then--> new`.
    Now,
    /// `prev_latest --then--> new`.
    Latest,
}

// ── WorldGraph ────────────────────────────────────────────────────────────────

/// Directed episode graph of tagged bindings and weakly causal edges.
///
/// The symbolic layer stays tiny and fast; engrams carry heavy payloads.
/// Bindings reference each other by id only — storage is an arena keyed by
/// [`BindingId`] with O(1) lookup.
pub struct WorldGraph {
    pub(crate) bindings: FxHashMap<BindingId, Binding>,
    pub(crate) anchors: BTreeMap<String, BindingId>,
    pub(crate) latest: Option<BindingId>,
    pub(crate) next_id: u32,
    pub(crate) memory_mode: MemoryMode,
    pub(crate) planner: Planner,
    stage: Stage,
    tag_policy: TagPolicy,
    lexicon: TagLexicon,
    /// tag wire string → canonical binding (semantic mode only).
    semantic_index: FxHashMap<String, BindingId>,
}

impl Default for WorldGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldGraph {
    /// An empty episodic graph.  The initial planner honours the
    /// `CAPRA_PLANNER` environment variable (invalid values are ignored).
    pub fn new() -> Self {
        Self::with_memory_mode(MemoryMode::Episodic)
    }

    pub fn with_memory_mode(memory_mode: MemoryMode) -> Self {
        WorldGraph {
            bindings: FxHashMap::default(),
            anchors: BTreeMap::new(),
            latest: None,
            next_id: 1,
            memory_mode,
            planner: planner_from_env(),
            stage: Stage::Neonate,
            tag_policy: TagPolicy::Allow,
            lexicon: TagLexicon::new(),
            semantic_index: FxHashMap::default(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, bid: BindingId) -> Option<&Binding> {
        self.bindings.get(&bid)
    }

    /// Mutable access for slot-style tag surgery (body/working maps).
    ///
    /// The semantic index is not maintained through this accessor; use the
    /// `add_*` operations for consolidating graphs.
    pub fn binding_mut(&mut self, bid: BindingId) -> Option<&mut Binding> {
        self.bindings.get_mut(&bid)
    }

    pub fn contains(&self, bid: BindingId) -> bool {
        self.bindings.contains_key(&bid)
    }

    /// Iterate bindings in ascending id order.
    pub fn bindings_sorted(&self) -> Vec<&Binding> {
        let mut all: Vec<&Binding> = self.bindings.values().collect();
        all.sort_by_key(|b| b.id);
        all
    }

    pub fn anchor(&self, name: &str) -> Option<BindingId> {
        self.anchors.get(name).copied()
    }

    /// The NOW anchor, if established.
    pub fn now(&self) -> Option<BindingId> {
        self.anchor("NOW")
    }

    /// The most recently created (or consolidated-onto) binding.
    pub fn latest(&self) -> Option<BindingId> {
        self.latest
    }

    pub fn memory_mode(&self) -> MemoryMode {
        self.memory_mode
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Derive the stage from simulated age.
    pub fn set_stage_from_age(&mut self, age_days: f64) {
        self.stage = Stage::from_age_days(age_days);
    }

    pub fn tag_policy(&self) -> TagPolicy {
        self.tag_policy
    }

    pub fn set_tag_policy(&mut self, policy: TagPolicy) {
        self.tag_policy = policy;
    }

    pub fn lexicon(&self) -> &TagLexicon {
        &self.lexicon
    }

    pub fn lexicon_mut(&mut self) -> &mut TagLexicon {
        &mut self.lexicon
    }

    /// Switch memory mode; the semantic index is rebuilt from graph
    /// contents (oldest binding per tag wins as canonical).
    pub fn set_memory_mode(&mut self, mode: MemoryMode) {
        self.memory_mode = mode;
        self.rebuild_semantic_index();
    }

    /// All bindings carrying `tag`, ascending id.
    pub fn bindings_with_tag(&self, tag: &Tag) -> Vec<BindingId> {
        let mut hits: Vec<BindingId> = self
            .bindings
            .values()
            .filter(|b| b.has_tag(tag))
            .map(|b| b.id)
            .collect();
        hits.sort();
        hits
    }

    pub fn any_binding_has_tag(&self, tag: &Tag) -> bool {
        self.bindings.values().any(|b| b.has_tag(tag))
    }

    // ── Lexicon enforcement ───────────────────────────────────────────────

    fn enforce_tag(&self, family: TagFamily, token_local: &str) -> GraphResult<()> {
        if !self.lexicon.is_allowed(family, token_local, self.stage) {
            match self.tag_policy {
                TagPolicy::Strict => {
                    return Err(GraphError::InvalidTag {
                        tag: format!("{}:{token_local}", family.as_str()),
                        stage: self.stage,
                    });
                }
                TagPolicy::Warn => {
                    warn!(
                        family = family.as_str(),
                        token = token_local,
                        stage = %self.stage,
                        "tag outside stage lexicon (allowing)"
                    );
                }
                TagPolicy::Allow => {}
            }
        } else if let Some(preferred) = self.lexicon.preferred_of(token_local) {
            if preferred != token_local && self.tag_policy != TagPolicy::Allow {
                // Legacy accepted; suggest the canonical, never rewrite.
                warn!(
                    family = family.as_str(),
                    legacy = token_local,
                    preferred,
                    "legacy tag token (kept as written)"
                );
            }
        }
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn alloc_id(&mut self) -> BindingId {
        let id = BindingId(self.next_id);
        self.next_id += 1;
        id
    }

    fn edge_exists(&self, src: BindingId, dst: BindingId, label: &str) -> bool {
        self.bindings
            .get(&src)
            .is_some_and(|b| b.edges.iter().any(|e| e.to == dst && e.label == label))
    }

    pub(crate) fn semantic_index_insert(&mut self, bid: BindingId) {
        if self.memory_mode != MemoryMode::Semantic {
            return;
        }
        let Some(b) = self.bindings.get(&bid) else { return };
        let keys: Vec<String> = b
            .tags
            .iter()
            .filter(|t| t.is_pred() || t.is_cue())
            .map(Tag::to_string)
            .collect();
        for key in keys {
            // First-seen (oldest) binding stays canonical.
            self.semantic_index.entry(key).or_insert(bid);
        }
    }

    pub(crate) fn rebuild_semantic_index(&mut self) {
        self.semantic_index.clear();
        if self.memory_mode != MemoryMode::Semantic {
            return;
        }
        let mut ids: Vec<BindingId> = self.bindings.keys().copied().collect();
        ids.sort();
        for bid in ids {
            self.semantic_index_insert(bid);
        }
    }

    fn semantic_lookup(&self, tag: &Tag) -> Option<BindingId> {
        if self.memory_mode != MemoryMode::Semantic {
            return None;
        }
        let bid = *self.semantic_index.get(&tag.to_string())?;
        self.bindings.contains_key(&bid).then_some(bid)
    }

    /// Consolidation fast path: reuse the canonical binding for `tag`,
    /// bump its telemetry, preserve sequencing edges (without duplicates or
    /// self-loops), and make it LATEST.
    fn consolidate_onto(&mut self, existing: BindingId, attach: Attach, meta: &Meta) -> BindingId {
        let prev_latest = self.latest;
        self.latest = Some(existing);

        if !meta.is_empty() {
            if let Some(b) = self.bindings.get_mut(&existing) {
                let slot = b
                    .meta
                    .entry("_consolidated".to_owned())
                    .or_insert_with(|| json!({}));
                if let Some(obj) = slot.as_object_mut() {
                    let seen = obj.get("seen").and_then(Value::as_i64).unwrap_or(0);
                    obj.insert("seen".to_owned(), json!(seen + 1));
                    obj.insert("last_meta".to_owned(), json!(meta));
                }
            }
        }

        let src = match attach {
            Attach::None => None,
            Attach::Now => Some(self.ensure_anchor("NOW")),
            Attach::Latest => prev_latest.filter(|p| self.bindings.contains_key(p)),
        };
        if let Some(src) = src {
            if src != existing && !self.edge_exists(src, existing, THEN) {
                // Both endpoints exist and src != dst, so this cannot fail.
                let _ = self.add_edge(src, existing, THEN, meta.clone(), false);
            }
        }

        existing
    }

    /// Shared creation path for predicate/cue/action writes.
    fn create_tagged(
        &mut self,
        tags: BTreeSet<Tag>,
        attach: Attach,
        meta: Meta,
        engrams: BTreeMap<String, EngramRef>,
    ) -> BindingId {
        let prev_latest = self.latest;
        let bid = self.alloc_id();
        self.bindings
            .insert(bid, Binding::new(bid, tags, meta.clone(), engrams));
        self.latest = Some(bid);

        match attach {
            Attach::None => {}
            Attach::Now => {
                let src = self.ensure_anchor("NOW");
                let _ = self.add_edge(src, bid, THEN, meta, false);
            }
            Attach::Latest => {
                if let Some(prev) = prev_latest.filter(|p| self.bindings.contains_key(p)) {
                    let _ = self.add_edge(prev, bid, THEN, meta, false);
                }
            }
        }

        self.semantic_index_insert(bid);
        bid
    }

    // ── Creation ──────────────────────────────────────────────────────────

    /// Create a binding with arbitrary tags.  Prefer [`add_predicate`] and
    /// friends for the common cases so family prefixes stay standardized.
    ///
    /// [`add_predicate`]: Self::add_predicate
    pub fn add_binding(
        &mut self,
        tags: BTreeSet<Tag>,
        meta: Meta,
        engrams: BTreeMap<String, EngramRef>,
    ) -> BindingId {
        let bid = self.alloc_id();
        self.bindings.insert(bid, Binding::new(bid, tags, meta, engrams));
        self.latest = Some(bid);
        self.semantic_index_insert(bid);
        bid
    }

    /// Add a predicate node carrying `pred:<token>`.
    ///
    /// `token` is family-local (`posture:fallen`) or pre-prefixed
    /// (`pred:posture:fallen`); both normalize to the same tag.  Episodic
    /// mode always creates a fresh binding; semantic mode reuses the
    /// canonical binding for the tag and bumps its `_consolidated`
    /// telemetry.  Legacy aliases configured for the token are recorded as
    /// extra `pred:` tags.
    pub fn add_predicate(&mut self, token: &str, attach: Attach, meta: Meta) -> GraphResult<BindingId> {
        self.add_predicate_with(token, attach, meta, BTreeMap::new())
    }

    pub fn add_predicate_with(
        &mut self,
        token: &str,
        attach: Attach,
        meta: Meta,
        engrams: BTreeMap<String, EngramRef>,
    ) -> GraphResult<BindingId> {
        let local = self.lexicon.normalize(TagFamily::Pred, token);
        self.enforce_tag(TagFamily::Pred, &local)?;
        let tag = Tag::Pred(local.clone());

        if let Some(existing) = self.semantic_lookup(&tag) {
            return Ok(self.consolidate_onto(existing, attach, &meta));
        }

        let mut tags = BTreeSet::from([tag]);
        for alias in self.lexicon.aliases_for_pred(&local) {
            self.enforce_tag(TagFamily::Pred, &alias)?;
            tags.insert(Tag::Pred(alias));
        }
        Ok(self.create_tagged(tags, attach, meta, engrams))
    }

    /// Add a cue node carrying `cue:<token>`.  Cues are evidence, never
    /// planner goals.
    pub fn add_cue(&mut self, token: &str, attach: Attach, meta: Meta) -> GraphResult<BindingId> {
        self.add_cue_with(token, attach, meta, BTreeMap::new())
    }

    pub fn add_cue_with(
        &mut self,
        token: &str,
        attach: Attach,
        meta: Meta,
        engrams: BTreeMap<String, EngramRef>,
    ) -> GraphResult<BindingId> {
        let local = self.lexicon.normalize(TagFamily::Cue, token);
        self.enforce_tag(TagFamily::Cue, &local)?;
        let tag = Tag::Cue(local);

        if let Some(existing) = self.semantic_lookup(&tag) {
            return Ok(self.consolidate_onto(existing, attach, &meta));
        }
        Ok(self.create_tagged(BTreeSet::from([tag]), attach, meta, engrams))
    }

    /// Add an action node carrying the canonical `action:<token>` tag
    /// (no `pred:action:*` form is written).
    pub fn add_action(&mut self, token: &str, attach: Attach, meta: Meta) -> GraphResult<BindingId> {
        let local = self.lexicon.normalize(TagFamily::Action, token);
        self.enforce_tag(TagFamily::Action, &local)?;
        Ok(self.create_tagged(
            BTreeSet::from([Tag::Action(local)]),
            attach,
            meta,
            BTreeMap::new(),
        ))
    }

    // ── Edges ─────────────────────────────────────────────────────────────

    /// Add a directed edge `src → dst`.  Edges append in call order.
    pub fn add_edge(
        &mut self,
        src: BindingId,
        dst: BindingId,
        label: &str,
        meta: Meta,
        allow_self_loop: bool,
    ) -> GraphResult<()> {
        if !self.bindings.contains_key(&src) {
            return Err(GraphError::UnknownBinding(src));
        }
        if !self.bindings.contains_key(&dst) {
            return Err(GraphError::UnknownBinding(dst));
        }
        if src == dst && !allow_self_loop {
            return Err(GraphError::InvalidEdge(format!(
                "self-loop {src} -> {dst} rejected (pass allow_self_loop to permit)"
            )));
        }
        if let Some(b) = self.bindings.get_mut(&src) {
            b.edges.push(Edge { to: dst, label: label.to_owned(), meta });
        }
        Ok(())
    }

    /// Remove edges matching `(src → dst [label])`; `label = None` removes
    /// every `src → dst` edge.  Returns how many were removed.
    pub fn delete_edge(&mut self, src: BindingId, dst: BindingId, label: Option<&str>) -> GraphResult<usize> {
        let b = self
            .bindings
            .get_mut(&src)
            .ok_or(GraphError::UnknownBinding(src))?;
        let before = b.edges.len();
        b.edges.retain(|e| {
            if e.to != dst {
                return true;
            }
            match label {
                None => false,
                Some(l) => e.label != l,
            }
        });
        Ok(before - b.edges.len())
    }

    /// Alias for [`delete_edge`](Self::delete_edge), kept for older callers.
    pub fn remove_edge(&mut self, src: BindingId, dst: BindingId, label: Option<&str>) -> GraphResult<usize> {
        self.delete_edge(src, dst, label)
    }

    /// Delete a binding.  Conservative; used primarily for working-map
    /// pruning.  Returns `false` if `bid` did not exist.
    pub fn delete_binding(&mut self, bid: BindingId, prune_incoming: bool, prune_anchors: bool) -> bool {
        if !self.bindings.contains_key(&bid) {
            return false;
        }
        if prune_incoming {
            for b in self.bindings.values_mut() {
                b.edges.retain(|e| e.to != bid);
            }
        }
        if prune_anchors {
            self.anchors.retain(|_, aid| *aid != bid);
        }
        self.bindings.remove(&bid);
        if self.latest == Some(bid) {
            self.latest = None;
        }
        self.semantic_index.retain(|_, xid| *xid != bid);
        true
    }

    // ── Anchors ───────────────────────────────────────────────────────────

    /// Ensure a named anchor binding exists and return its id.  Idempotent;
    /// anchor creation never moves LATEST.
    pub fn ensure_anchor(&mut self, name: &str) -> BindingId {
        if let Some(&bid) = self.anchors.get(name) {
            return bid;
        }
        let bid = self.alloc_id();
        let binding = Binding::new(
            bid,
            BTreeSet::from([Tag::anchor(name)]),
            Meta::new(),
            BTreeMap::new(),
        );
        self.bindings.insert(bid, binding);
        self.anchors.insert(name.to_owned(), bid);
        bid
    }

    /// Re-point the NOW anchor to an existing binding.
    ///
    /// The anchors map is the source of truth; the `anchor:NOW` tag is
    /// human-facing housekeeping.  With `tag` the new binding gains the
    /// tag; with `clean_previous` the old NOW binding loses it.  Returns
    /// the previous NOW id.  Edges and LATEST are untouched — this changes
    /// orientation only.
    pub fn set_now(&mut self, bid: BindingId, tag: bool, clean_previous: bool) -> GraphResult<Option<BindingId>> {
        if !self.bindings.contains_key(&bid) {
            return Err(GraphError::UnknownBinding(bid));
        }
        let prev = self.anchors.get("NOW").copied();
        if clean_previous {
            if let Some(p) = prev.filter(|p| *p != bid) {
                if let Some(b) = self.bindings.get_mut(&p) {
                    b.tags.remove(&Tag::anchor("NOW"));
                }
            }
        }
        self.anchors.insert("NOW".to_owned(), bid);
        if tag {
            if let Some(b) = self.bindings.get_mut(&bid) {
                b.tags.insert(Tag::anchor("NOW"));
            }
        }
        Ok(prev)
    }

    // ── Engram pointers ───────────────────────────────────────────────────

    /// Attach an engram pointer to a binding under a column slot name.
    pub fn attach_engram(&mut self, bid: BindingId, column: &str, engram: EngramRef) -> GraphResult<()> {
        let b = self
            .bindings
            .get_mut(&bid)
            .ok_or(GraphError::UnknownBinding(bid))?;
        b.engrams.insert(column.to_owned(), engram);
        Ok(())
    }

    // ── Invariants ────────────────────────────────────────────────────────

    /// Validate basic graph invariants, returning human-readable issues.
    ///
    /// Checks: `anchors["NOW"]` resolves and carries `anchor:NOW`; LATEST
    /// (if set) resolves; every anchor entry resolves; every edge
    /// destination resolves.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut issues: Vec<String> = Vec::new();

        if let Some(now_id) = self.anchors.get("NOW") {
            match self.bindings.get(now_id) {
                None => issues.push("anchors[\"NOW\"] points to unknown binding id".to_owned()),
                Some(b) => {
                    if !b.has_tag(&Tag::anchor("NOW")) {
                        issues.push("NOW binding missing 'anchor:NOW' tag".to_owned());
                    }
                }
            }
        }

        for (name, aid) in &self.anchors {
            if name != "NOW" && !self.bindings.contains_key(aid) {
                issues.push(format!("anchors[{name:?}] points to unknown binding id"));
            }
        }

        if let Some(latest) = self.latest {
            if !self.bindings.contains_key(&latest) {
                issues.push("latest binding id is not present in the graph".to_owned());
            }
        }

        for b in self.bindings_sorted() {
            for e in &b.edges {
                if !self.bindings.contains_key(&e.to) {
                    issues.push(format!("edge {} -> {} points to unknown binding", b.id, e.to));
                }
            }
        }

        issues
    }

    /// [`check_invariants`](Self::check_invariants), raising on violation.
    pub fn assert_invariants(&self) -> GraphResult<()> {
        let issues = self.check_invariants();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Corrupt(issues.join("; ")))
        }
    }
}
