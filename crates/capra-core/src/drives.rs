//! Homeostatic drives.
//!
//! Three bounded scalars describe the agent's internal state.  Policy
//! triggers never read the floats directly for flag logic — they go through
//! [`Drives::flag_tags`], which applies the canonical strict thresholds.

use serde::{Deserialize, Serialize};

/// Hunger above this yields `drive:hunger_high`.
pub const HUNGER_HIGH: f64 = 0.60;
/// Fatigue above this yields `drive:fatigue_high`.
pub const FATIGUE_HIGH: f64 = 0.70;
/// Warmth below this yields `drive:cold`.
pub const WARMTH_LOW: f64 = 0.30;

/// Agent internal state, each component in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drives {
    pub hunger: f64,
    pub fatigue: f64,
    pub warmth: f64,
}

impl Default for Drives {
    /// Neonate boot state: hungry, rested, warm enough.
    fn default() -> Self {
        Drives { hunger: 0.7, fatigue: 0.2, warmth: 0.6 }
    }
}

impl Drives {
    /// Derived `drive:*` flag tokens (family-local; strict inequalities).
    pub fn flag_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.hunger > HUNGER_HIGH {
            tags.push("drive:hunger_high");
        }
        if self.fatigue > FATIGUE_HIGH {
            tags.push("drive:fatigue_high");
        }
        if self.warmth < WARMTH_LOW {
            tags.push("drive:cold");
        }
        tags
    }

    /// Add `delta` to hunger, clamped to `[0, 1]`.
    pub fn adjust_hunger(&mut self, delta: f64) {
        self.hunger = (self.hunger + delta).clamp(0.0, 1.0);
    }

    /// Add `delta` to fatigue, clamped to `[0, 1]`.
    pub fn adjust_fatigue(&mut self, delta: f64) {
        self.fatigue = (self.fatigue + delta).clamp(0.0, 1.0);
    }

    /// Add `delta` to warmth, clamped to `[0, 1]`.
    pub fn adjust_warmth(&mut self, delta: f64) {
        self.warmth = (self.warmth + delta).clamp(0.0, 1.0);
    }
}
