//! Keyframe gating.
//!
//! A keyframe is the per-tick decision to persist a richer snapshot into
//! the long-term graph.  Each trigger is independently configurable; the
//! decision function is pure — counter bookkeeping stays in the pipeline.

use capra_core::KeyframeConfig;

/// Why a keyframe fired.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum KeyframeReason {
    StageChange,
    ZoneChange,
    Periodic,
    PredErrStreak,
    Milestone,
    Emotion,
}

impl KeyframeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyframeReason::StageChange => "stage_change",
            KeyframeReason::ZoneChange => "zone_change",
            KeyframeReason::Periodic => "periodic",
            KeyframeReason::PredErrStreak => "pred_err_streak",
            KeyframeReason::Milestone => "milestone",
            KeyframeReason::Emotion => "emotion",
        }
    }
}

/// Everything the decision needs about the current tick.
#[derive(Debug, Clone, Default)]
pub struct KeyframeInput<'a> {
    pub stage_changed: bool,
    pub zone_changed: bool,
    /// Milestone events reported by the environment this step.
    pub milestones: &'a [String],
    /// Derived fallen→standing posture transition.
    pub derived_stood_up: bool,
    pub emotion_intensity: Option<f64>,
    /// Current trailing run of posture pred-err ticks.
    pub pred_err_streak: usize,
    /// Sleep states suppressing the periodic trigger when configured.
    pub sleeping_non_dreaming: bool,
    pub sleeping_dreaming: bool,
    /// Steps since the periodic counter last reset (already incremented
    /// for this tick).
    pub steps_since_periodic: u64,
}

/// Evaluate every configured trigger; the returned reasons are in a fixed
/// order (stage, zone, periodic, pred-err, milestone, emotion).
pub fn decide_keyframes(cfg: &KeyframeConfig, input: &KeyframeInput<'_>) -> Vec<KeyframeReason> {
    let mut reasons = Vec::new();

    if cfg.on_stage_change && input.stage_changed {
        reasons.push(KeyframeReason::StageChange);
    }
    if cfg.on_zone_change && input.zone_changed {
        reasons.push(KeyframeReason::ZoneChange);
    }

    if cfg.period_steps > 0 && input.steps_since_periodic >= cfg.period_steps {
        let suppressed = (cfg.period_suppress_when_sleeping_non_dreaming && input.sleeping_non_dreaming)
            || (cfg.period_suppress_when_sleeping_dreaming && input.sleeping_dreaming);
        if !suppressed {
            reasons.push(KeyframeReason::Periodic);
        }
    }

    if cfg.on_pred_err && input.pred_err_streak >= cfg.pred_err_min_streak {
        reasons.push(KeyframeReason::PredErrStreak);
    }

    if cfg.on_milestone {
        let explicit = input.milestones.iter().any(|m| m == "stood_up");
        if explicit || input.derived_stood_up {
            reasons.push(KeyframeReason::Milestone);
        }
    }

    if cfg.on_emotion {
        if let Some(intensity) = input.emotion_intensity {
            if intensity >= cfg.emotion_threshold {
                reasons.push(KeyframeReason::Emotion);
            }
        }
    }

    reasons
}
