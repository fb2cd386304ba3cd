//! The observation wire contract.
//!
//! Tokens arrive family-local (`posture:standing`, not
//! `pred:posture:standing`); the pipeline prefixes them before graph
//! writes.  Everything is JSON-safe so scripted backends and logs share
//! one schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use capra_grid::NavPatch;

/// Environment-reported emotional tone for the current step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    pub kind: String,
    /// `[0, 1]`; compared against the keyframe emotion threshold.
    pub intensity: f64,
}

/// Environment metadata attached to every observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_stage: Option<String>,

    /// Step reference used to seed reproducible masking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_since_birth: Option<f64>,

    /// Milestone events fired this step (e.g. `"stood_up"`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// One tick's worth of environment output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Raw sensor channels, untouched by the pipeline.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub raw_sensors: BTreeMap<String, Value>,

    /// Family-local predicate tokens.
    #[serde(default)]
    pub predicates: Vec<String>,

    /// Family-local cue tokens.
    #[serde(default)]
    pub cues: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nav_patches: Vec<NavPatch>,

    #[serde(default)]
    pub env_meta: EnvMeta,
}

impl Observation {
    /// Minimal observation carrying only predicates — handy in tests and
    /// scripted storyboard stubs.
    pub fn with_predicates(predicates: &[&str]) -> Self {
        Observation {
            predicates: predicates.iter().map(|s| (*s).to_owned()).collect(),
            ..Default::default()
        }
    }

    /// `true` when the given family-local predicate is present.
    pub fn has_predicate(&self, token: &str) -> bool {
        self.predicates.iter().any(|p| p == token)
    }

    pub fn has_cue(&self, token: &str) -> bool {
        self.cues.iter().any(|c| c == token)
    }
}
