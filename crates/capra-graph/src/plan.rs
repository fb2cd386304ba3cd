//! Path planning to a target predicate.
//!
//! The planner is intentionally simple and replaceable: BFS for shortest
//! hops, Dijkstra for minimum meta-weighted cost.  Both search *outgoing*
//! edges only and stop at the first binding carrying the target `pred:*`
//! tag.  Cue tags are never goals.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use capra_core::BindingId;

use crate::binding::Edge;
use crate::error::{GraphError, GraphResult};
use crate::graph::WorldGraph;
use crate::tag::{Tag, TagFamily};

/// Environment variable selecting the initial planner strategy.
pub const PLANNER_ENV: &str = "CAPRA_PLANNER";

// ── Planner ───────────────────────────────────────────────────────────────────

/// Path-search strategy used by [`WorldGraph::plan_to_predicate`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Planner {
    #[default]
    Bfs,
    Dijkstra,
}

impl Planner {
    pub fn as_str(self) -> &'static str {
        match self {
            Planner::Bfs => "bfs",
            Planner::Dijkstra => "dijkstra",
        }
    }

    pub fn parse(s: &str) -> GraphResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfs" => Ok(Planner::Bfs),
            "dijkstra" => Ok(Planner::Dijkstra),
            _ => Err(GraphError::UnknownPlanner(s.to_owned())),
        }
    }
}

/// Initial strategy from the environment; unset or invalid values fall back
/// to BFS so a typo in a shell profile can't break planning.
pub(crate) fn planner_from_env() -> Planner {
    match std::env::var(PLANNER_ENV) {
        Ok(v) => Planner::parse(&v).unwrap_or_default(),
        Err(_) => Planner::default(),
    }
}

// ── Edge cost ─────────────────────────────────────────────────────────────────

/// Meta keys consulted for Dijkstra edge cost, in priority order.
const COST_KEYS: [&str; 4] = ["weight", "cost", "distance", "duration_s"];

/// Numeric cost for an edge: first present numeric key wins, else 1.0.
fn edge_cost(e: &Edge) -> f64 {
    for key in COST_KEYS {
        if let Some(v) = e.meta.get(key) {
            if let Some(n) = v.as_f64() {
                return n;
            }
        }
    }
    1.0
}

/// Total path cost ordered via `total_cmp` so it can live in a binary heap.
#[derive(PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

// ── Search ────────────────────────────────────────────────────────────────────

impl WorldGraph {
    /// Current strategy.
    pub fn planner(&self) -> Planner {
        self.planner
    }

    pub fn set_planner(&mut self, planner: Planner) {
        self.planner = planner;
    }

    /// Parse-and-set convenience for CLI/config strings.
    pub fn set_planner_str(&mut self, strategy: &str) -> GraphResult<()> {
        self.planner = Planner::parse(strategy)?;
        Ok(())
    }

    /// Plan from `src` to the first binding carrying `pred:<token>`.
    ///
    /// Returns the full id path (src first, goal last) or `None` when the
    /// goal is unreachable or `src` is unknown.  `token` may be family-local
    /// or already `pred:`-prefixed.
    pub fn plan_to_predicate(&self, src: BindingId, token: &str) -> Option<Vec<BindingId>> {
        let local = self.lexicon().normalize(TagFamily::Pred, token);
        let target = Tag::Pred(local);

        let start = self.binding(src)?;
        if start.has_tag(&target) {
            return Some(vec![src]);
        }

        match self.planner {
            Planner::Bfs => self.plan_bfs(src, &target),
            Planner::Dijkstra => self.plan_dijkstra(src, &target),
        }
    }

    /// Render-friendly wrapper: plan and pretty-print, or `"(no path)"`.
    pub fn plan_pretty(&self, src: BindingId, token: &str) -> String {
        match self.plan_to_predicate(src, token) {
            Some(path) => self.pretty_path(&path),
            None => "(no path)".to_owned(),
        }
    }

    /// `true` when a binding carrying `pred:<token>` is reachable from
    /// `src` within `max_hops` edges (0 = `src` itself).
    pub fn pred_within_hops(&self, src: BindingId, token: &str, max_hops: usize) -> bool {
        let local = self.lexicon().normalize(TagFamily::Pred, token);
        let target = Tag::Pred(local);

        let Some(start) = self.binding(src) else { return false };
        if start.has_tag(&target) {
            return true;
        }

        let mut visited: FxHashSet<BindingId> = FxHashSet::from_iter([src]);
        let mut frontier = vec![src];
        for _ in 0..max_hops {
            let mut next = Vec::new();
            for bid in frontier {
                let Some(b) = self.binding(bid) else { continue };
                for e in &b.edges {
                    if !visited.insert(e.to) {
                        continue;
                    }
                    let Some(nb) = self.binding(e.to) else { continue };
                    if nb.has_tag(&target) {
                        return true;
                    }
                    next.push(e.to);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        false
    }

    // ── BFS ───────────────────────────────────────────────────────────────

    fn plan_bfs(&self, src: BindingId, target: &Tag) -> Option<Vec<BindingId>> {
        let mut queue: VecDeque<BindingId> = VecDeque::from([src]);
        let mut parent: FxHashMap<BindingId, Option<BindingId>> = FxHashMap::default();
        parent.insert(src, None);

        while let Some(cur) = queue.pop_front() {
            let Some(b) = self.binding(cur) else { continue };
            for e in &b.edges {
                // Visited-on-enqueue: the parent map doubles as the set.
                if parent.contains_key(&e.to) {
                    continue;
                }
                let Some(nb) = self.binding(e.to) else { continue };
                parent.insert(e.to, Some(cur));

                // Goal test on the neighbor keeps BFS one layer ahead.
                if nb.has_tag(target) {
                    return Some(reconstruct(&parent, e.to));
                }
                queue.push_back(e.to);
            }
        }
        None
    }

    // ── Dijkstra ──────────────────────────────────────────────────────────

    fn plan_dijkstra(&self, src: BindingId, target: &Tag) -> Option<Vec<BindingId>> {
        let mut dist: FxHashMap<BindingId, f64> = FxHashMap::default();
        let mut parent: FxHashMap<BindingId, Option<BindingId>> = FxHashMap::default();
        let mut settled: FxHashSet<BindingId> = FxHashSet::default();

        dist.insert(src, 0.0);
        parent.insert(src, None);

        // Min-heap via Reverse; BindingId as secondary key for
        // deterministic tie-breaking.
        let mut heap: BinaryHeap<Reverse<(Cost, BindingId)>> = BinaryHeap::new();
        heap.push(Reverse((Cost(0.0), src)));

        while let Some(Reverse((Cost(d), node))) = heap.pop() {
            if !settled.insert(node) {
                continue; // stale heap entry
            }
            let Some(b) = self.binding(node) else { continue };

            // Goal test when popped: the distance is then guaranteed minimal.
            if b.has_tag(target) {
                return Some(reconstruct(&parent, node));
            }

            for e in &b.edges {
                if !self.contains(e.to) {
                    continue;
                }
                let w = edge_cost(e);
                if w < 0.0 {
                    // Non-negative costs only; pathological negatives are skipped.
                    continue;
                }
                let nd = d + w;
                if nd < dist.get(&e.to).copied().unwrap_or(f64::INFINITY) {
                    dist.insert(e.to, nd);
                    parent.insert(e.to, Some(node));
                    heap.push(Reverse((Cost(nd), e.to)));
                }
            }
        }
        None
    }
}

/// Rebuild a path from parent links (goal back to source).
fn reconstruct(parent: &FxHashMap<BindingId, Option<BindingId>>, goal: BindingId) -> Vec<BindingId> {
    let mut path = vec![goal];
    let mut cur = goal;
    while let Some(Some(p)) = parent.get(&cur) {
        path.push(*p);
        cur = *p;
    }
    path.reverse();
    path
}

/// Expose edge-cost resolution for analytics/tests.
pub fn edge_cost_of(meta_value: &Edge) -> f64 {
    edge_cost(meta_value)
}

/// `true` when `v` is a JSON number (helper shared with analytics).
pub(crate) fn is_numeric(v: &Value) -> bool {
    v.as_f64().is_some()
}
