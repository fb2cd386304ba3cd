//! Developmental tag lexicon.
//!
//! A constrained vocabulary per developmental stage — the core-knowledge
//! stance: the neonate starts with a small fixed token set and later stages
//! only ever *add*.  Enforcement is light and configurable: `Allow` admits
//! silently, `Warn` logs and admits, `Strict` rejects writes with
//! [`GraphError::InvalidTag`].
//!
//! Legacy tokens map to a preferred canonical form.  They are admitted and
//! the canonical is suggested in the log; nothing is auto-rewritten.  The
//! shipped legacy map is empty — populate it when old snapshots need
//! bridging.
//!
//! [`GraphError::InvalidTag`]: crate::error::GraphError::InvalidTag

use std::fmt;
use std::str::FromStr;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::GraphError;
use crate::tag::TagFamily;

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Developmental stage.  Stages are cumulative: each includes every earlier
/// stage's vocabulary.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub enum Stage {
    #[default]
    Neonate,
    Infant,
    Juvenile,
    Adult,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::Neonate, Stage::Infant, Stage::Juvenile, Stage::Adult];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Neonate => "neonate",
            Stage::Infant => "infant",
            Stage::Juvenile => "juvenile",
            Stage::Adult => "adult",
        }
    }

    /// Stage derived from age: neonate through day 3, infant after.
    pub fn from_age_days(age_days: f64) -> Stage {
        if age_days <= 3.0 {
            Stage::Neonate
        } else {
            Stage::Infant
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "neonate" => Ok(Stage::Neonate),
            "infant" => Ok(Stage::Infant),
            "juvenile" => Ok(Stage::Juvenile),
            "adult" => Ok(Stage::Adult),
            _ => Err(GraphError::UnknownStage(s.to_owned())),
        }
    }
}

// ── TagPolicy ─────────────────────────────────────────────────────────────────

/// Lexicon enforcement level.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum TagPolicy {
    /// Admit anything silently.
    #[default]
    Allow,
    /// Admit out-of-lexicon tokens with a `tracing` warning.
    Warn,
    /// Reject out-of-lexicon tokens with `InvalidTag`.
    Strict,
}

// ── TagLexicon ────────────────────────────────────────────────────────────────

/// Per-stage token additions for one family.
struct StageBase {
    stage: Stage,
    family: TagFamily,
    tokens: &'static [&'static str],
}

/// The newborn-goat vocabulary.  Later stages currently add nothing; the
/// table rows exist so additions land in one obvious place.
const BASE: &[StageBase] = &[
    StageBase {
        stage: Stage::Neonate,
        family: TagFamily::Pred,
        tokens: &[
            // Posture / body facts
            "posture:standing",
            "posture:fallen",
            // Spatial / proximity
            "proximity:mom:close",
            "proximity:mom:far",
            "proximity:shelter:near",
            "proximity:shelter:far",
            "mom:close",
            // Hazard / cliff proximity
            "hazard:cliff:near",
            "hazard:cliff:far",
            // Grid-derived slot families on the map-surface SELF
            "hazard:near",
            "terrain:traversable_near",
            "goal:dir:N",
            "goal:dir:S",
            "goal:dir:E",
            "goal:dir:W",
            "goal:dir:NE",
            "goal:dir:SE",
            "goal:dir:NW",
            "goal:dir:SW",
            // Feeding / episode facts
            "nipple:found",
            "nipple:latched",
            "nipple:missed",
            "milk:drinking",
            "resting",
            "alert",
            "seeking_mom",
            "state:seeking_mom",
            "sleeping:non_dreaming",
            "sleeping:dreaming",
            // Intent predicates
            "stand",
            // Valence (available from birth)
            "valence:like",
            "valence:hate",
        ],
    },
    StageBase {
        stage: Stage::Neonate,
        family: TagFamily::Action,
        tokens: &["push_up", "extend_legs", "look_around", "orient_to_mom", "probe_surroundings"],
    },
    StageBase {
        stage: Stage::Neonate,
        family: TagFamily::Cue,
        tokens: &[
            "vision:silhouette:mom",
            "scent:milk",
            "sound:bleat:mom",
            "terrain:rocky",
            "vestibular:fall",
            "touch:flank_on_ground",
            "drive:hunger_high",
            "drive:fatigue_high",
            "drive:cold",
            "wm:mapsurface_snapshot",
        ],
    },
    StageBase {
        stage: Stage::Neonate,
        family: TagFamily::Anchor,
        tokens: &["NOW", "NOW_ORIGIN", "HERE"],
    },
];

/// Cumulative-per-stage allowed-token sets plus a legacy alias map.
pub struct TagLexicon {
    /// `allowed[stage][family]` — permitted family-local tokens, cumulative.
    allowed: FxHashMap<(Stage, &'static str), FxHashSet<&'static str>>,
    /// legacy token → preferred canonical (family-local on both sides).
    legacy: FxHashMap<String, String>,
}

impl Default for TagLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl TagLexicon {
    pub fn new() -> Self {
        let mut allowed: FxHashMap<(Stage, &'static str), FxHashSet<&'static str>> =
            FxHashMap::default();
        let mut acc: FxHashMap<&'static str, FxHashSet<&'static str>> = FxHashMap::default();
        for stage in Stage::ORDER {
            for base in BASE.iter().filter(|b| b.stage == stage) {
                acc.entry(base.family.as_str())
                    .or_default()
                    .extend(base.tokens.iter().copied());
            }
            for family in [TagFamily::Pred, TagFamily::Cue, TagFamily::Anchor, TagFamily::Action] {
                let snapshot = acc.get(family.as_str()).cloned().unwrap_or_default();
                allowed.insert((stage, family.as_str()), snapshot);
            }
        }
        TagLexicon { allowed, legacy: FxHashMap::default() }
    }

    /// Register a legacy token and its preferred canonical form.
    pub fn add_legacy_alias(&mut self, legacy: &str, preferred: &str) {
        self.legacy.insert(legacy.to_owned(), preferred.to_owned());
    }

    /// `true` if `token` (preferred or legacy) is permitted at `stage`.
    pub fn is_allowed(&self, family: TagFamily, token: &str, stage: Stage) -> bool {
        if self
            .allowed
            .get(&(stage, family.as_str()))
            .is_some_and(|set| set.contains(token))
        {
            return true;
        }
        self.legacy.contains_key(token)
    }

    /// Preferred canonical form if `token` is legacy, else `None`.
    pub fn preferred_of(&self, token: &str) -> Option<&str> {
        self.legacy.get(token).map(String::as_str)
    }

    /// Legacy aliases for a canonical predicate token (reverse lookup),
    /// deduped, stable order.
    pub fn aliases_for_pred(&self, token_local: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (legacy, preferred) in &self.legacy {
            if preferred == token_local && !out.iter().any(|a| a == legacy) {
                out.push(legacy.clone());
            }
        }
        out.sort();
        out
    }

    /// Strip a leading family prefix if present, returning the family-local
    /// token: `pred:posture:standing` → `posture:standing`.
    pub fn normalize(&self, family: TagFamily, raw: &str) -> String {
        let tok = raw.trim();
        let prefix = family.as_str();
        match tok.strip_prefix(prefix) {
            Some(rest) if rest.starts_with(':') => rest[1..].to_owned(),
            _ => tok.to_owned(),
        }
    }
}
