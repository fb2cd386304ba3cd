//! Partial-observability masking.
//!
//! Each unprotected token is dropped independently with probability `p`.
//! The RNG is rebuilt from `(seed, step_index)` per observation, so a
//! replayed step reference reproduces the same drops.  Guarantees:
//!
//! - Protected prefixes are never dropped (safety-critical families).
//! - A non-empty predicate list never masks down to nothing: the first
//!   original predicate survives.
//! - `p = 0` is a strict no-op (the RNG is not even constructed).

use rand::Rng;
use tracing::warn;

use capra_core::rng::mask_rng;

use crate::observation::Observation;

/// Masking configuration.
#[derive(Debug, Clone)]
pub struct MaskConfig {
    /// Per-token drop probability.
    pub prob: f64,
    pub seed: u64,
    /// Log dropped tokens at `warn` level.
    pub verbose: bool,
    /// Token prefixes that are never dropped.  This list is policy, not
    /// hard-coded semantics — tune it per embodiment.
    pub protected_prefixes: Vec<String>,
}

impl Default for MaskConfig {
    fn default() -> Self {
        MaskConfig {
            prob: 0.0,
            seed: 0,
            verbose: true,
            protected_prefixes: vec![
                "posture:".to_owned(),
                "hazard:cliff:".to_owned(),
                "proximity:shelter:".to_owned(),
            ],
        }
    }
}

impl MaskConfig {
    fn is_protected(&self, token: &str) -> bool {
        self.protected_prefixes.iter().any(|p| token.starts_with(p.as_str()))
    }
}

/// What the mask did to one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskOutcome {
    pub dropped_predicates: usize,
    pub dropped_cues: usize,
}

/// Apply the mask in place.
pub fn apply_mask(obs: &mut Observation, cfg: &MaskConfig) -> MaskOutcome {
    let mut outcome = MaskOutcome::default();
    if cfg.prob <= 0.0 {
        return outcome;
    }

    let step = obs.env_meta.step_index.unwrap_or(0);
    let mut rng = mask_rng(cfg.seed, step);
    let p = cfg.prob.clamp(0.0, 1.0);

    let first_predicate = obs.predicates.first().cloned();

    let mut keep_token = |token: &String, kind: &str, dropped: &mut usize| -> bool {
        if cfg.is_protected(token) {
            return true;
        }
        if rng.gen_bool(p) {
            *dropped += 1;
            if cfg.verbose {
                warn!(token = token.as_str(), kind, step, "observation token masked out");
            }
            return false;
        }
        true
    };

    obs.predicates
        .retain(|t| keep_token(t, "predicate", &mut outcome.dropped_predicates));
    obs.cues.retain(|t| keep_token(t, "cue", &mut outcome.dropped_cues));

    // Never blind the agent completely: keep the first original predicate
    // when everything else was masked away.
    if obs.predicates.is_empty() {
        if let Some(first) = first_predicate {
            outcome.dropped_predicates -= 1;
            obs.predicates.push(first);
        }
    }

    outcome
}
