//! Runtime context — configuration knobs plus per-run mutable state.
//!
//! Everything a tick needs is threaded explicitly; nothing lives in
//! process globals.  `Ctx` carries (a) the configuration knobs with their
//! documented defaults,
//! (b) soft-clock state, (c) perception bookkeeping (pred-err history,
//! body-map staleness, change-detection snapshots), and (d) per-run caches
//! such as the NavPatch signature → engram dedup map.
//!
//! Ownership contract: perception mutates `Ctx`; policies read it.  No
//! component other than the runtime replaces it wholesale.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;

use crate::ids::EngramId;
use crate::rng::RunRng;
use crate::temporal::TemporalContext;

/// Rolling pred-err history length (ticks).
const PRED_ERR_HISTORY_CAP: usize = 16;

// ── Mode enums ────────────────────────────────────────────────────────────────

/// How per-tick observations reach the long-term graph.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LongTermMode {
    /// Write every observation as new bindings.
    Raw,
    /// Only write when a slot family changes or a keyframe fires.
    #[default]
    Changes,
}

/// How a retrieved MapSurface prior is applied to the working map.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum AutoretrieveMode {
    #[default]
    Merge,
    Replace,
}

impl AutoretrieveMode {
    /// Parse a case-insensitive mode string; unknown values fall back to merge.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => AutoretrieveMode::Replace,
            _ => AutoretrieveMode::Merge,
        }
    }
}

// ── Keyframe knobs ────────────────────────────────────────────────────────────

/// Keyframe gating configuration.  Event triggers default on; the periodic
/// cadence defaults off (`period_steps = 0`).
#[derive(Debug, Clone)]
pub struct KeyframeConfig {
    /// Fire when `env_meta.scenario_stage` changes.
    pub on_stage_change: bool,
    /// Fire when the derived zone changes.
    pub on_zone_change: bool,
    /// Fire on milestone events (explicit or derived fallen→standing).
    pub on_milestone: bool,
    /// Fire when emotion intensity reaches `emotion_threshold`.
    pub on_emotion: bool,
    /// Fire on a posture pred-err streak.
    pub on_pred_err: bool,
    /// Periodic cadence in controller steps; 0 disables.
    pub period_steps: u64,
    /// Reset the periodic counter whenever *any* keyframe fires.
    pub period_reset_on_any_keyframe: bool,
    /// Minimum consecutive pred-err ticks before the streak trigger fires.
    pub pred_err_min_streak: usize,
    /// Emotion intensity threshold.
    pub emotion_threshold: f64,
    /// Suppress the periodic trigger while `sleeping:non_dreaming`.
    pub period_suppress_when_sleeping_non_dreaming: bool,
    /// Suppress the periodic trigger while `sleeping:dreaming`.
    pub period_suppress_when_sleeping_dreaming: bool,
}

impl Default for KeyframeConfig {
    fn default() -> Self {
        KeyframeConfig {
            on_stage_change: true,
            on_zone_change: true,
            on_milestone: true,
            on_emotion: true,
            on_pred_err: true,
            period_steps: 0,
            period_reset_on_any_keyframe: false,
            pred_err_min_streak: 2,
            emotion_threshold: 0.85,
            period_suppress_when_sleeping_non_dreaming: false,
            period_suppress_when_sleeping_dreaming: false,
        }
    }
}

// ── Pred-err ──────────────────────────────────────────────────────────────────

/// Posture prediction-error record for the most recent comparison (v0:
/// a single 0/1 per family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredErr {
    /// 1 when the posted posture expectation mismatched the observation.
    pub posture: u8,
}

// ── Ctx ───────────────────────────────────────────────────────────────────────

/// Mutable runtime context for one agent session.
#[derive(Debug)]
pub struct Ctx {
    // ── Identity / development ────────────────────────────────────────────
    /// Simulated age in days; gates developmental policy loading.
    pub age_days: f64,
    /// Count of action-center decision loops run this session.
    pub controller_steps: u64,
    /// Count of cognitive cycles that produced a long-term write.
    pub cog_cycles: u64,
    /// Raw environment tick counter.
    pub ticks: u64,

    // ── Perception knobs ──────────────────────────────────────────────────
    /// Per-token drop probability for observation masking (0 = off).
    pub obs_mask_prob: f64,
    /// Seed half of the `(seed, step_index)` mask derivation.
    pub obs_mask_seed: u64,
    /// Log each dropped token at `warn` level.
    pub obs_mask_verbose: bool,
    /// Master switch for long-term observation writes.
    pub longterm_obs_enabled: bool,
    /// Raw vs. change/keyframe-gated long-term writes.
    pub longterm_obs_mode: LongTermMode,
    /// Keyframe gating flags and thresholds.
    pub keyframe: KeyframeConfig,

    // ── Working-map knobs ─────────────────────────────────────────────────
    /// Mirror observations into the working map each tick.
    pub working_enabled: bool,
    /// Maintain the schematic MapSurface view inside the working map.
    pub working_mapsurface: bool,
    /// Enable keyframe-time MapSurface auto-retrieve.
    pub wm_mapsurface_autoretrieve_enabled: bool,
    pub wm_mapsurface_autoretrieve_mode: AutoretrieveMode,
    /// Candidate priors considered per retrieval, clamped to `[1, 10]` at
    /// the guard.
    pub wm_mapsurface_autoretrieve_top_k: usize,
    /// Load the ambiguity-driven probe policy.
    pub probe_enabled: bool,

    // ── RL knobs ──────────────────────────────────────────────────────────
    pub rl_enabled: bool,
    pub rl_epsilon: f64,

    // ── Soft clock ────────────────────────────────────────────────────────
    pub temporal: TemporalContext,
    /// Vector copy taken at the last boundary.
    pub tvec_last_boundary: Option<Vec<f64>>,
    /// Sign-bit fingerprint taken at the last boundary.
    pub boundary_vhash64: Option<String>,

    // ── Perception state ──────────────────────────────────────────────────
    /// Posture expectation posted by a policy for the next tick.
    pub pred_next_posture: Option<String>,
    /// Most recent pred-err comparison.
    pub pred_err_last: Option<PredErr>,
    /// Bounded rolling history of posture pred-err bits (newest last).
    pub pred_err_history: VecDeque<u8>,
    /// Controller step of the last body-map refresh.
    pub bodymap_last_update_step: Option<u64>,
    /// Scenario stage seen on the previous tick (change detection).
    pub last_scenario_stage: Option<String>,
    /// Derived zone seen on the previous tick (change detection).
    pub last_zone: Option<String>,
    /// Predicate slot-family snapshot from the previous tick (`changes` mode).
    pub last_slot_families: BTreeMap<String, String>,
    /// Cue family snapshot from the previous tick (`changes` mode).
    pub last_cue_families: BTreeMap<String, String>,
    /// Steps since the periodic keyframe counter last reset.
    pub steps_since_periodic_keyframe: u64,

    // ── Per-run caches / scratch ──────────────────────────────────────────
    /// NavPatch v1 signature → engram id dedup cache.
    pub navpatch_sig_to_eid: FxHashMap<String, EngramId>,
    /// Unresolved NavPatch ambiguity keys (probe side-loop input).
    pub wm_scratch_ambiguity: Vec<String>,
    /// Probe attention window: grid precision boost active until this step.
    pub probe_boost_until_step: Option<u64>,

    /// Run-level RNG (RL tie-breaks and other runtime draws).
    pub rng: RunRng,
}

impl Ctx {
    /// Build a context with documented defaults, seeding the temporal vector
    /// and the run RNG from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = RunRng::new(seed);
        let temporal_seed: u64 = rng.random();
        Ctx {
            age_days: 0.0,
            controller_steps: 0,
            cog_cycles: 0,
            ticks: 0,
            obs_mask_prob: 0.0,
            obs_mask_seed: 0,
            obs_mask_verbose: true,
            longterm_obs_enabled: true,
            longterm_obs_mode: LongTermMode::Changes,
            keyframe: KeyframeConfig::default(),
            working_enabled: true,
            working_mapsurface: true,
            wm_mapsurface_autoretrieve_enabled: false,
            wm_mapsurface_autoretrieve_mode: AutoretrieveMode::Merge,
            wm_mapsurface_autoretrieve_top_k: 5,
            probe_enabled: false,
            rl_enabled: false,
            rl_epsilon: 0.0,
            temporal: TemporalContext::with_defaults(temporal_seed),
            tvec_last_boundary: None,
            boundary_vhash64: None,
            pred_next_posture: None,
            pred_err_last: None,
            pred_err_history: VecDeque::new(),
            bodymap_last_update_step: None,
            last_scenario_stage: None,
            last_zone: None,
            last_slot_families: BTreeMap::new(),
            last_cue_families: BTreeMap::new(),
            steps_since_periodic_keyframe: 0,
            navpatch_sig_to_eid: FxHashMap::default(),
            wm_scratch_ambiguity: Vec::new(),
            probe_boost_until_step: None,
            rng,
        }
    }

    /// 64-bit sign-bit fingerprint of the current temporal vector.
    pub fn tvec64(&self) -> String {
        self.temporal.tvec64()
    }

    /// Cosine(now, last boundary); `None` before the first boundary.
    pub fn cos_to_last_boundary(&self) -> Option<f64> {
        self.tvec_last_boundary
            .as_ref()
            .map(|lb| self.temporal.cosine_to(lb))
    }

    /// Take an event boundary: jump the temporal vector and record the
    /// post-jump copy and fingerprint as the new epoch reference.
    pub fn take_boundary(&mut self) {
        let v = self.temporal.boundary();
        self.boundary_vhash64 = Some(self.temporal.tvec64());
        self.tvec_last_boundary = Some(v);
    }

    /// Record one pred-err comparison and push it onto the bounded history.
    pub fn record_pred_err(&mut self, posture_err: u8) {
        self.pred_err_last = Some(PredErr { posture: posture_err });
        self.pred_err_history.push_back(posture_err);
        while self.pred_err_history.len() > PRED_ERR_HISTORY_CAP {
            self.pred_err_history.pop_front();
        }
    }

    /// Length of the current trailing run of pred-err = 1 ticks.
    pub fn pred_err_streak(&self) -> usize {
        self.pred_err_history
            .iter()
            .rev()
            .take_while(|&&e| e == 1)
            .count()
    }

    /// `true` once the body map has gone more than `max_steps` controller
    /// steps without a refresh.
    pub fn bodymap_is_stale(&self, max_steps: u64) -> bool {
        match self.bodymap_last_update_step {
            Some(at) => self.controller_steps.saturating_sub(at) > max_steps,
            None => true,
        }
    }

    pub fn reset_controller_steps(&mut self) {
        self.controller_steps = 0;
    }

    pub fn reset_cog_cycles(&mut self) {
        self.cog_cycles = 0;
    }
}
