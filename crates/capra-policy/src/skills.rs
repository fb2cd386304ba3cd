//! The skill ledger — per-policy running stats.
//!
//! Scaffolding for reinforcement learning: counts, success tally, and an
//! exponentially averaged q value.  Selection uses q only as an optional
//! tie-break; the ledger's day job is diagnostics and snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Exponential-average learning rate for q updates.
const ALPHA: f64 = 0.3;

/// Running stats for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SkillStat {
    /// Executions.
    pub n: u64,
    /// Executions that reported `ok`.
    pub succ: u64,
    /// `q = (1 − α)·q + α·reward` after every execution.
    pub q: f64,
    pub last_reward: f64,
}

/// Policy-name → stats map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillLedger {
    skills: BTreeMap<String, SkillStat>,
}

impl SkillLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution.
    pub fn record(&mut self, name: &str, reward: f64, ok: bool) {
        let s = self.skills.entry(name.to_owned()).or_default();
        s.n += 1;
        if ok {
            s.succ += 1;
        }
        s.q = (1.0 - ALPHA) * s.q + ALPHA * reward;
        s.last_reward = reward;
    }

    pub fn get(&self, name: &str) -> Option<&SkillStat> {
        self.skills.get(name)
    }

    /// q value for tie-breaking; unknown policies score 0.
    pub fn q(&self, name: &str) -> f64 {
        self.skills.get(name).map_or(0.0, |s| s.q)
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SkillStat)> {
        self.skills.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Human-readable table for snapshots and debug menus.
    pub fn readout(&self) -> String {
        if self.skills.is_empty() {
            return "(no skill stats yet)".to_owned();
        }
        self.skills
            .iter()
            .map(|(name, s)| {
                let rate = if s.n > 0 { s.succ as f64 / s.n as f64 } else { 0.0 };
                format!(
                    "{name}: n={}, succ={}, rate={rate:.2}, q={:.2}, last={:+.2}",
                    s.n, s.succ, s.q, s.last_reward
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
