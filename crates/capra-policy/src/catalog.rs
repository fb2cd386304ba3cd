//! The concrete policy catalog.
//!
//! Order matters: [`default_catalog`] is the authoritative order used for
//! tie-breaking when drive scores draw.  Each policy appends a short chain
//! of bindings and stamps provenance — `meta.policy` on bindings,
//! `meta.created_by` on auto-added edges.

use chrono::Local;
use serde_json::json;

use capra_core::{Ctx, Drives, HUNGER_HIGH};
use capra_graph::{Attach, GraphResult, Meta, Tag, WorldGraph};
use capra_percept::BodyMap;

use crate::policy::{Outcome, Policy, PolicyStatus};

/// Hops from NOW that count as "near" for trigger checks.
const NEAR_HOPS: usize = 3;
/// Probe attention window length (controller steps).
const PROBE_WINDOW_STEPS: u64 = 3;

/// The authoritative catalog, in scan/tie-break order.
pub fn default_catalog() -> Vec<Box<dyn Policy>> {
    vec![
        Box::new(StandUp),
        Box::new(SeekNipple),
        Box::new(Rest),
        Box::new(Suckle),
        Box::new(RecoverMiss),
        Box::new(RecoverFall),
        Box::new(Probe),
    ]
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Provenance meta stamped on every binding a policy creates.
fn policy_meta(name: &str, ctx: &Ctx) -> Meta {
    Meta::from([
        ("policy".to_owned(), json!(name)),
        ("created_at".to_owned(), json!(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string())),
        ("ticks".to_owned(), json!(ctx.ticks)),
        ("tvec64".to_owned(), json!(ctx.tvec64())),
    ])
}

/// Provenance meta stamped on every edge a policy creates.
fn edge_meta(name: &str) -> Meta {
    Meta::from([("created_by".to_owned(), json!(name))])
}

/// `pred:<token>` reachable within [`NEAR_HOPS`] of NOW.
fn near_now(world: &WorldGraph, token: &str) -> bool {
    world
        .now()
        .is_some_and(|now| world.pred_within_hops(now, token, NEAR_HOPS))
}

fn any_cue(world: &WorldGraph, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| world.any_binding_has_tag(&Tag::cue(t)))
}

fn ok(name: &str, reward: f64, notes: &str, binding: Option<capra_core::BindingId>) -> Outcome {
    Outcome {
        policy: Some(name.to_owned()),
        status: PolicyStatus::Ok,
        reward,
        notes: notes.to_owned(),
        binding,
    }
}

// ── StandUp ───────────────────────────────────────────────────────────────────

/// First motor milestone: push up, extend legs, stand.
///
/// Dev-gated to the neonate window; fires while a `stand` intent sits near
/// NOW and the agent isn't already upright.
pub struct StandUp;

impl Policy for StandUp {
    fn name(&self) -> &'static str {
        "policy:stand_up"
    }

    fn dev_gate(&self, ctx: &Ctx) -> bool {
        ctx.age_days <= 3.0
    }

    fn trigger(&self, world: &WorldGraph, body: &BodyMap, _drives: &Drives, _ctx: &Ctx) -> bool {
        if body.is_standing() || world.any_binding_has_tag(&Tag::pred("posture:standing")) {
            return false;
        }
        near_now(world, "stand")
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let push = world.add_action("push_up", Attach::Now, meta.clone())?;
        let extend = world.add_action("extend_legs", Attach::None, meta.clone())?;
        let stand = world.add_predicate("posture:standing", Attach::None, meta)?;
        world.add_edge(push, extend, "then", edge_meta(self.name()), false)?;
        world.add_edge(extend, stand, "then", edge_meta(self.name()), false)?;

        drives.adjust_fatigue(0.05);
        ctx.pred_next_posture = Some("standing".to_owned());
        Ok(ok(self.name(), 1.0, "standing", Some(stand)))
    }

    fn explain(&self) -> &'static str {
        "stand intent near NOW and not already upright"
    }
}

// ── SeekNipple ────────────────────────────────────────────────────────────────

/// Orient toward mom and start seeking once upright and hungry, given any
/// mom cue (silhouette, milk scent, bleat).
pub struct SeekNipple;

impl Policy for SeekNipple {
    fn name(&self) -> &'static str {
        "policy:seek_nipple"
    }

    fn trigger(&self, world: &WorldGraph, body: &BodyMap, drives: &Drives, _ctx: &Ctx) -> bool {
        if body.is_fallen() {
            return false;
        }
        let standing = body.is_standing() || near_now(world, "posture:standing");
        if !standing || drives.hunger <= HUNGER_HIGH {
            return false;
        }
        if world.any_binding_has_tag(&Tag::pred("state:seeking_mom")) {
            return false;
        }
        any_cue(world, &["vision:silhouette:mom", "scent:milk", "sound:bleat:mom"])
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, _drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let orient = world.add_action("orient_to_mom", Attach::Now, meta.clone())?;
        let seeking = world.add_predicate("state:seeking_mom", Attach::None, meta)?;
        world.add_edge(orient, seeking, "then", edge_meta(self.name()), false)?;
        Ok(ok(self.name(), 0.5, "seeking mom", Some(seeking)))
    }

    fn explain(&self) -> &'static str {
        "standing, hungry, and a mom cue present"
    }
}

// ── Rest ──────────────────────────────────────────────────────────────────────

/// Lie down and recover when fatigue runs high.
pub struct Rest;

impl Policy for Rest {
    fn name(&self) -> &'static str {
        "policy:rest"
    }

    fn trigger(&self, world: &WorldGraph, _body: &BodyMap, drives: &Drives, _ctx: &Ctx) -> bool {
        drives.fatigue > capra_core::FATIGUE_HIGH || any_cue(world, &["drive:fatigue_high"])
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let resting = world.add_predicate("resting", Attach::Now, meta)?;
        drives.adjust_fatigue(-0.2);
        Ok(ok(self.name(), 0.2, "resting", Some(resting)))
    }

    fn explain(&self) -> &'static str {
        "fatigue over threshold or fatigue cue present"
    }
}

// ── Suckle ────────────────────────────────────────────────────────────────────

/// Latch and drink once mom is close.
pub struct Suckle;

impl Policy for Suckle {
    fn name(&self) -> &'static str {
        "policy:suckle"
    }

    fn trigger(&self, world: &WorldGraph, _body: &BodyMap, _drives: &Drives, _ctx: &Ctx) -> bool {
        near_now(world, "mom:close")
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let latched = world.add_predicate("nipple:latched", Attach::Now, meta.clone())?;
        let drinking = world.add_predicate("milk:drinking", Attach::None, meta)?;
        world.add_edge(latched, drinking, "then", edge_meta(self.name()), false)?;

        drives.adjust_hunger(-0.3);
        drives.adjust_warmth(0.05);
        Ok(ok(self.name(), 0.8, "suckling", Some(drinking)))
    }

    fn explain(&self) -> &'static str {
        "mom close near NOW"
    }
}

// ── RecoverMiss ───────────────────────────────────────────────────────────────

/// A missed latch re-orients the search rather than giving up.
pub struct RecoverMiss;

impl Policy for RecoverMiss {
    fn name(&self) -> &'static str {
        "policy:recover_miss"
    }

    fn trigger(&self, world: &WorldGraph, _body: &BodyMap, _drives: &Drives, _ctx: &Ctx) -> bool {
        near_now(world, "nipple:missed")
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, _drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let orient = world.add_action("orient_to_mom", Attach::Now, meta.clone())?;
        let seeking = world.add_predicate("seeking_mom", Attach::None, meta)?;
        world.add_edge(orient, seeking, "then", edge_meta(self.name()), false)?;
        Ok(ok(self.name(), 0.3, "re-orienting after miss", Some(seeking)))
    }

    fn explain(&self) -> &'static str {
        "missed latch near NOW"
    }
}

// ── RecoverFall ───────────────────────────────────────────────────────────────

/// Safety recovery: get back upright after a fall.
pub struct RecoverFall;

impl Policy for RecoverFall {
    fn name(&self) -> &'static str {
        "policy:recover_fall"
    }

    fn trigger(&self, world: &WorldGraph, body: &BodyMap, _drives: &Drives, _ctx: &Ctx) -> bool {
        body.is_fallen()
            || near_now(world, "posture:fallen")
            || any_cue(world, &["vestibular:fall", "touch:flank_on_ground"])
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let push = world.add_action("push_up", Attach::Now, meta.clone())?;
        let stand = world.add_predicate("posture:standing", Attach::None, meta)?;
        world.add_edge(push, stand, "then", edge_meta(self.name()), false)?;

        drives.adjust_fatigue(0.1);
        ctx.pred_next_posture = Some("standing".to_owned());
        Ok(ok(self.name(), 0.7, "recovered from fall", Some(stand)))
    }

    fn explain(&self) -> &'static str {
        "fallen posture (body-first) or fall cues"
    }
}

// ── Probe ─────────────────────────────────────────────────────────────────────

/// Attention side-loop: perceptual ambiguity buys a short window of
/// boosted grid precision.
pub struct Probe;

impl Policy for Probe {
    fn name(&self) -> &'static str {
        "policy:probe"
    }

    fn dev_gate(&self, ctx: &Ctx) -> bool {
        ctx.probe_enabled
    }

    fn trigger(&self, _world: &WorldGraph, _body: &BodyMap, _drives: &Drives, ctx: &Ctx) -> bool {
        !ctx.wm_scratch_ambiguity.is_empty()
    }

    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, _drives: &mut Drives) -> GraphResult<Outcome> {
        let meta = policy_meta(self.name(), ctx);
        let probe = world.add_action("probe_surroundings", Attach::Now, meta)?;

        ctx.probe_boost_until_step = Some(ctx.controller_steps + PROBE_WINDOW_STEPS);
        let resolved = ctx.wm_scratch_ambiguity.pop().unwrap_or_default();
        Ok(ok(
            self.name(),
            0.1,
            &format!("probing ambiguity {resolved}"),
            Some(probe),
        ))
    }

    fn explain(&self) -> &'static str {
        "unresolved perception ambiguity parked in scratch"
    }
}
