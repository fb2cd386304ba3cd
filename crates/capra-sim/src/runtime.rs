//! The `Runtime` struct and its tick loop.

use serde_json::Value;
use tracing::debug;

use capra_core::{AutoretrieveMode, Ctx, Drives};
use capra_engram::ColumnMemory;
use capra_graph::WorldGraph;
use capra_percept::{
    ingest_observation, merge_mapsurface_into_workingmap, pick_best_mapsurface_rec,
    should_autoretrieve_mapsurface, store_mapsurface_snapshot, BodyMap, MergeReport, Observation,
    PerceptionConfig, TickIngest, WorkingMap,
};
use capra_policy::{Outcome, PolicyRuntime, SkillLedger};

use crate::env::Environment;
use crate::error::SimResult;
use crate::observer::RunObserver;

// ── Reports ───────────────────────────────────────────────────────────────────

/// What one auto-retrieve attempt did.
#[derive(Debug, Clone, Default)]
pub struct AutoretrieveReport {
    pub why: &'static str,
    pub merged: Option<MergeReport>,
}

/// Everything one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub ingest: TickIngest,
    pub outcome: Outcome,
    pub autoretrieve: Option<AutoretrieveReport>,
    /// Drive values after policy side-effects.
    pub drives: Drives,
}

/// Aggregate of a full [`Runtime::run`].
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub keyframes: u64,
    pub policies_fired: u64,
    /// Cumulative environment reward.
    pub env_reward: f64,
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// Owns all agent state and drives the tick loop.
///
/// No process globals: every collaborator is a field, so two runtimes can
/// coexist and a test can inspect everything without reaching through
/// statics.
pub struct Runtime {
    pub ctx: Ctx,
    pub world: WorldGraph,
    pub working: WorkingMap,
    pub body: BodyMap,
    pub drives: Drives,
    pub skills: SkillLedger,
    pub column: ColumnMemory,
    pub policies: PolicyRuntime,
    pub perception: PerceptionConfig,
}

impl Runtime {
    /// Fresh runtime; every stochastic subsystem seeds from `seed`.
    pub fn new(seed: u64) -> Self {
        Runtime {
            ctx: Ctx::new(seed),
            world: WorldGraph::new(),
            working: WorkingMap::new(),
            body: BodyMap::new(),
            drives: Drives::default(),
            skills: SkillLedger::new(),
            column: ColumnMemory::new("column01", seed ^ 0x636f_6c75_6d6e),
            policies: PolicyRuntime::new(),
            perception: PerceptionConfig::default(),
        }
    }

    /// One end-to-end tick: perception, optional auto-retrieve, policy.
    pub fn tick(&mut self, obs: &Observation) -> TickReport {
        self.ctx.ticks += 1;
        self.ctx.temporal.step();

        // ── Perception → WM → long-term ───────────────────────────────────
        let ingest = ingest_observation(
            &mut self.world,
            &mut self.working,
            &mut self.body,
            &mut self.column,
            &mut self.ctx,
            &self.perception,
            obs,
        );

        // ── Keyframe side-effects: boundary, snapshot, auto-retrieve ──────
        let mut autoretrieve = None;
        if ingest.keyframe {
            self.ctx.take_boundary();
            if self.ctx.working_enabled && self.ctx.working_mapsurface {
                autoretrieve = self.keyframe_mapsurface_pass(&ingest);
            }
        }

        // ── Action center ─────────────────────────────────────────────────
        self.policies.refresh_loaded(&self.ctx);
        let outcome = self.policies.consider_and_maybe_fire(
            &mut self.world,
            &self.body,
            &mut self.drives,
            &mut self.ctx,
            &mut self.skills,
        );
        self.ctx.controller_steps += 1;

        TickReport {
            tick: self.ctx.ticks,
            ingest,
            outcome,
            autoretrieve,
            drives: self.drives.clone(),
        }
    }

    /// Snapshot the MapSurface, then (when the guard says so) retrieve and
    /// apply the best prior — excluding the snapshot just written.
    fn keyframe_mapsurface_pass(&mut self, ingest: &TickIngest) -> Option<AutoretrieveReport> {
        let stage = ingest.stage.as_deref();
        let zone = ingest.zone.as_deref();

        let just_stored = store_mapsurface_snapshot(
            &mut self.world,
            &self.working,
            &mut self.column,
            &self.ctx,
            stage,
            zone,
        );

        let decision = should_autoretrieve_mapsurface(
            &self.ctx,
            true,
            ingest.stage_changed,
            ingest.zone_changed,
        );
        if !decision.ok {
            debug!(why = decision.why, "mapsurface auto-retrieve skipped");
            return None;
        }

        let prior: Value = {
            let rec = pick_best_mapsurface_rec(
                &self.world,
                &self.column,
                &self.working,
                stage,
                zone,
                decision.top_k,
                Some(just_stored),
            )?;
            rec.payload.clone()
        };

        if decision.mode == AutoretrieveMode::Replace {
            if let Some(entities) = prior.get("entities").and_then(Value::as_object) {
                for entity_id in entities.keys() {
                    self.working.clear_entity_preds(entity_id);
                }
            }
        }
        let merged = merge_mapsurface_into_workingmap(&mut self.working, &prior);
        Some(AutoretrieveReport { why: decision.why, merged: Some(merged) })
    }

    /// Drive a full episode against an environment.
    ///
    /// Runs until `done` or `max_ticks`, invoking observer hooks at every
    /// tick boundary.
    pub fn run<E: Environment, O: RunObserver>(
        &mut self,
        env: &mut E,
        max_ticks: u64,
        observer: &mut O,
    ) -> SimResult<RunSummary> {
        let mut summary = RunSummary::default();
        let (mut obs, _info) = env.reset(None);

        for _ in 0..max_ticks {
            observer.on_tick_start(self.ctx.ticks + 1);
            let report = self.tick(&obs);

            summary.ticks += 1;
            if report.ingest.keyframe {
                summary.keyframes += 1;
                observer.on_keyframe(&report);
            }
            if report.outcome.policy.is_some() {
                summary.policies_fired += 1;
            }
            observer.on_tick_end(&report);

            let action = report.outcome.policy.clone();
            let (next_obs, reward, done, _info) = env.step(action.as_deref(), &mut self.ctx);
            summary.env_reward += reward;
            if done {
                break;
            }
            obs = next_obs;
        }

        observer.on_run_end(self.ctx.ticks);
        Ok(summary)
    }
}
