//! The policy runtime: gating, safety override, scoring, firing.

use tracing::debug;

use capra_core::{Ctx, Drives, FATIGUE_HIGH, HUNGER_HIGH};
use capra_graph::WorldGraph;
use capra_percept::BodyMap;

use crate::catalog::default_catalog;
use crate::policy::{Outcome, Policy, PolicyStatus};
use crate::skills::SkillLedger;

/// Hops from NOW within which a fallen posture preempts normal behaviour.
const SAFETY_HOPS: usize = 3;
/// Policies allowed to fire while the agent is down.
const SAFETY_WHITELIST: [&str; 2] = ["policy:recover_fall", "policy:stand_up"];

/// Scans the catalog each tick and fires at most one policy.
pub struct PolicyRuntime {
    policies: Vec<Box<dyn Policy>>,
    /// Catalog indices whose dev gate passed at the last refresh.
    loaded: Vec<usize>,
}

impl Default for PolicyRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRuntime {
    /// Runtime over the authoritative default catalog.
    pub fn new() -> Self {
        Self::with_catalog(default_catalog())
    }

    /// Runtime over a custom catalog (tests, reduced repertoires).
    pub fn with_catalog(policies: Vec<Box<dyn Policy>>) -> Self {
        PolicyRuntime { policies, loaded: Vec::new() }
    }

    /// Names in catalog order (diagnostics).
    pub fn catalog_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// Names whose dev gate passed at the last refresh.
    pub fn loaded_names(&self) -> Vec<&'static str> {
        self.loaded.iter().map(|&i| self.policies[i].name()).collect()
    }

    /// Re-evaluate developmental gates; returns how many policies loaded.
    pub fn refresh_loaded(&mut self, ctx: &Ctx) -> usize {
        self.loaded = (0..self.policies.len())
            .filter(|&i| self.policies[i].dev_gate(ctx))
            .collect();
        self.loaded.len()
    }

    /// One action-center step: evaluate triggers, apply the safety
    /// override and drive scoring, execute the winner.
    ///
    /// Trigger evaluation never aborts the scan; an execution error is
    /// contained as `status: error` with the ledger recording a failure.
    pub fn consider_and_maybe_fire(
        &self,
        world: &mut WorldGraph,
        body: &BodyMap,
        drives: &mut Drives,
        ctx: &mut Ctx,
        skills: &mut SkillLedger,
    ) -> Outcome {
        let mut matches: Vec<usize> = self
            .loaded
            .iter()
            .copied()
            .filter(|&i| self.policies[i].trigger(world, body, drives, ctx))
            .collect();

        // Safety override — body-first: if proprioception says fallen, the
        // override applies even when the long-term graph has no fallen tag.
        let fallen = body.is_fallen()
            || world
                .now()
                .is_some_and(|now| world.pred_within_hops(now, "posture:fallen", SAFETY_HOPS));
        if fallen {
            matches.retain(|&i| SAFETY_WHITELIST.contains(&self.policies[i].name()));
        }

        let Some(&first) = matches.first() else {
            return Outcome::no_match();
        };

        let chosen = self.choose(&matches, drives, ctx, skills).unwrap_or(first);
        let name = self.policies[chosen].name();
        debug!(policy = name, candidates = matches.len(), fallen, "action center firing");

        match self.policies[chosen].execute(world, ctx, drives) {
            Ok(outcome) => {
                skills.record(name, outcome.reward, outcome.status == PolicyStatus::Ok);
                outcome
            }
            Err(e) => {
                skills.record(name, 0.0, false);
                Outcome {
                    policy: Some(name.to_owned()),
                    status: PolicyStatus::Error,
                    reward: 0.0,
                    notes: format!("exec error: {e}"),
                    binding: None,
                }
            }
        }
    }

    /// Pick among triggered candidates: highest drive-deficit score, ties
    /// by catalog order; RL mode prefers higher q among tied scores and
    /// explores uniformly with probability ε.
    fn choose(
        &self,
        matches: &[usize],
        drives: &Drives,
        ctx: &mut Ctx,
        skills: &SkillLedger,
    ) -> Option<usize> {
        let best_score = matches
            .iter()
            .map(|&i| drive_score(self.policies[i].name(), drives))
            .fold(f64::NEG_INFINITY, f64::max);

        // Candidates within float-noise of the best score, catalog order.
        let tied: Vec<usize> = matches
            .iter()
            .copied()
            .filter(|&i| (drive_score(self.policies[i].name(), drives) - best_score).abs() < 1e-12)
            .collect();

        if tied.len() > 1 && ctx.rl_enabled {
            let epsilon = ctx.rl_epsilon;
            if epsilon > 0.0 && ctx.rng.gen_bool(epsilon) {
                return ctx.rng.choose(&tied).copied();
            }
            return tied
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    skills
                        .q(self.policies[a].name())
                        .total_cmp(&skills.q(self.policies[b].name()))
                        // Stable: earlier catalog index wins exact q ties.
                        .then_with(|| b.cmp(&a))
                });
        }

        tied.first().copied()
    }
}

/// Drive-deficit score for a candidate; policies without a drive term
/// score zero and fall back to catalog order.
fn drive_score(name: &str, drives: &Drives) -> f64 {
    match name {
        "policy:seek_nipple" => (drives.hunger - HUNGER_HIGH).max(0.0),
        "policy:rest" => 0.7 * (drives.fatigue - FATIGUE_HIGH).max(0.0),
        _ => 0.0,
    }
}
