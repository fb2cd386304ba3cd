//! The environment boundary.
//!
//! The core is agnostic about how observations are produced — a scripted
//! storyboard, a replayed log, or a robot HAL all fit behind this trait.
//! Actions are plain strings; anything beginning `policy:` is understood
//! by environments as a policy-driven action.

use std::collections::BTreeMap;

use serde_json::Value;

use capra_core::Ctx;
use capra_percept::Observation;

/// Free-form auxiliary data returned by environment calls.
pub type Info = BTreeMap<String, Value>;

/// An external world the agent is embedded in.
pub trait Environment {
    /// Start (or restart) an episode.
    fn reset(&mut self, seed: Option<u64>) -> (Observation, Info);

    /// Advance one step.  `action` is the fired policy name, if any.
    ///
    /// Returns `(observation, reward, done, info)`.
    fn step(&mut self, action: Option<&str>, ctx: &mut Ctx) -> (Observation, f64, bool, Info);
}
