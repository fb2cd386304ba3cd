//! Edge-label (action) analytics and path rendering.

use std::collections::BTreeMap;

use capra_core::BindingId;

use crate::binding::Meta;
use crate::graph::{WorldGraph, THEN};
use crate::plan::is_numeric;

/// Default numeric meta keys aggregated by [`WorldGraph::action_metrics`].
pub const DEFAULT_METRIC_KEYS: [&str; 3] = ["meters", "duration_s", "speed_mps"];

/// Aggregate over one numeric meta key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricAgg {
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
}

/// Result of [`WorldGraph::action_metrics`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionMetrics {
    /// Edges carrying the label.
    pub count: usize,
    /// Per-key aggregates; keys with no numeric occurrences are omitted.
    pub keys: BTreeMap<String, MetricAgg>,
}

impl WorldGraph {
    /// Every well-formed edge as `(src, dst, &edge)`, ascending source id.
    fn iter_edges(&self) -> impl Iterator<Item = (BindingId, BindingId, &'_ crate::binding::Edge)> + '_ {
        self.bindings_sorted().into_iter().flat_map(move |b| {
            b.edges
                .iter()
                .filter(|e| self.contains(e.to))
                .map(move |e| (b.id, e.to, e))
        })
    }

    /// Sorted unique edge labels; hide the generic `then` with
    /// `include_then = false`.
    pub fn list_actions(&self, include_then: bool) -> Vec<String> {
        let mut labels: Vec<String> = self
            .iter_edges()
            .map(|(_, _, e)| e.label.clone())
            .filter(|l| include_then || l != THEN)
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Label → edge count.
    pub fn action_counts(&self, include_then: bool) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_, _, e) in self.iter_edges() {
            if !include_then && e.label == THEN {
                continue;
            }
            *counts.entry(e.label.clone()).or_default() += 1;
        }
        counts
    }

    /// Edges matching `label` as `(src, dst, meta)` tuples.
    pub fn edges_with_action(&self, label: &str) -> Vec<(BindingId, BindingId, &Meta)> {
        self.iter_edges()
            .filter(|(_, _, e)| e.label == label)
            .map(|(s, d, e)| (s, d, &e.meta))
            .collect()
    }

    /// Aggregate numeric edge-meta metrics for one label.  Keys that are
    /// absent or non-numeric on an edge are ignored for that edge.
    pub fn action_metrics(&self, label: &str, keys: &[&str]) -> ActionMetrics {
        let mut out = ActionMetrics::default();
        let mut acc: BTreeMap<&str, (usize, f64)> = keys.iter().map(|&k| (k, (0, 0.0))).collect();

        for (_, _, meta) in self.edges_with_action(label) {
            out.count += 1;
            for &key in keys {
                let Some(v) = meta.get(key) else { continue };
                if !is_numeric(v) {
                    continue;
                }
                if let (Some(n), Some(slot)) = (v.as_f64(), acc.get_mut(key)) {
                    slot.0 += 1;
                    slot.1 += n;
                }
            }
        }

        for (key, (count, sum)) in acc {
            if count > 0 {
                out.keys.insert(
                    key.to_owned(),
                    MetricAgg { count, sum, avg: sum / count as f64 },
                );
            }
        }
        out
    }

    // ── Path rendering ────────────────────────────────────────────────────

    /// Single-line rendering of an id path:
    /// `b1(NOW) --then--> b4[stand]`.
    ///
    /// Nodes render as `id[first-pred]`, anchors as `id(NAME)`; edge labels
    /// come from the first matching edge between consecutive nodes.
    pub fn pretty_path(&self, ids: &[BindingId]) -> String {
        if ids.is_empty() {
            return "(no path)".to_owned();
        }

        let node_label = |bid: BindingId| -> String {
            match self.binding(bid) {
                None => bid.to_string(),
                Some(b) => {
                    if let Some(pred) = b.first_pred() {
                        format!("{bid}[{pred}]")
                    } else if let Some(anchor) = b.anchor_name() {
                        format!("{bid}({anchor})")
                    } else {
                        bid.to_string()
                    }
                }
            }
        };

        let edge_label = |src: BindingId, dst: BindingId| -> Option<String> {
            self.binding(src)?
                .edges
                .iter()
                .find(|e| e.to == dst)
                .map(|e| e.label.clone())
        };

        let mut parts: Vec<String> = Vec::with_capacity(ids.len() * 2);
        for (i, &bid) in ids.iter().enumerate() {
            parts.push(node_label(bid));
            if let Some(&next) = ids.get(i + 1) {
                match edge_label(bid, next) {
                    Some(label) => parts.push(format!(" --{label}--> ")),
                    None => parts.push(" -> ".to_owned()),
                }
            }
        }
        parts.concat()
    }

    /// Human-readable action summary: labels with counts and a couple of
    /// example edges each.  Hides the generic `then` by default to cut noise.
    pub fn action_summary_text(&self, include_then: bool, examples_per_action: usize) -> String {
        let counts = self.action_counts(include_then);
        if counts.is_empty() {
            return "No actions (edge labels) recorded.".to_owned();
        }
        let total: usize = counts.values().sum();
        let mut lines = vec![format!("Actions summary (labels) — total labeled edges: {total}")];
        for (label, count) in &counts {
            lines.push(format!("  - {label}: {count}"));
            for (src, dst, _) in self.edges_with_action(label).into_iter().take(examples_per_action) {
                let name = |bid: BindingId| {
                    self.binding(bid)
                        .and_then(|b| b.first_pred().map(str::to_owned))
                        .unwrap_or_else(|| bid.to_string())
                };
                lines.push(format!("      e.g., {src}[{}] --{label}--> {dst}[{}]", name(src), name(dst)));
            }
        }
        lines.join("\n")
    }
}
