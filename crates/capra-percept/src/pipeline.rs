//! Per-tick observation ingestion.
//!
//! One call to [`ingest_observation`] runs the whole perception pass for a
//! tick, in phases mirroring the runtime's ownership rules: body map, then
//! working map, then engram stores, then the gated long-term write.  Any
//! malformed input is skipped with a log line; the tick never aborts.

use serde_json::json;
use tracing::{debug, warn};

use capra_core::{Ctx, EngramId, LongTermMode};
use capra_engram::{ColumnMemory, FactMeta};
use capra_graph::{Attach, Meta, WorldGraph};
use capra_grid::{
    compose_surfacegrid_v1, derive_slot_families, grid_errors_v1, navpatch_sig16_v1,
    navpatch_sig_v1, NavPatch, SlotFamilies,
};

use crate::bodymap::BodyMap;
use crate::keyframe::{decide_keyframes, KeyframeInput, KeyframeReason};
use crate::mask::{apply_mask, MaskConfig, MaskOutcome};
use crate::observation::Observation;
use crate::workingmap::{family_of, WorkingMap};

// ── Config ────────────────────────────────────────────────────────────────────

/// Static perception configuration (the dynamic knobs live on `Ctx`).
#[derive(Debug, Clone)]
pub struct PerceptionConfig {
    /// Composed SurfaceGrid shape.
    pub grid_w: usize,
    pub grid_h: usize,
    /// Slot-family derivation radius.
    pub slot_radius: i64,
    /// Protected prefixes for observation masking.
    pub protected_prefixes: Vec<String>,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        PerceptionConfig {
            grid_w: 5,
            grid_h: 5,
            slot_radius: 2,
            protected_prefixes: MaskConfig::default().protected_prefixes,
        }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Outcome of storing one NavPatch engram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPatchStore {
    pub stored: bool,
    /// `"stored"` or `"dedup_cache"`.
    pub reason: &'static str,
    pub engram_id: EngramId,
    pub sig: String,
}

/// Everything one ingestion pass did.
#[derive(Debug, Clone, Default)]
pub struct TickIngest {
    pub keyframe: bool,
    pub keyframe_reasons: Vec<KeyframeReason>,
    pub mask: MaskOutcome,
    /// Long-term bindings written this tick.
    pub written: usize,
    pub navpatch_stores: Vec<NavPatchStore>,
    pub slot_families: Option<SlotFamilies>,
    pub stage: Option<String>,
    pub zone: Option<String>,
    pub stage_changed: bool,
    pub zone_changed: bool,
}

impl TickIngest {
    pub fn fired(&self, reason: KeyframeReason) -> bool {
        self.keyframe_reasons.contains(&reason)
    }
}

// ── Ingestion ─────────────────────────────────────────────────────────────────

/// Run one perception pass.
///
/// Phases: mask → body map → pred-err → working-map mirror + SurfaceGrid →
/// NavPatch engrams (deduped) → keyframe decision → long-term write.
pub fn ingest_observation(
    world: &mut WorldGraph,
    wm: &mut WorkingMap,
    body: &mut BodyMap,
    column: &mut ColumnMemory,
    ctx: &mut Ctx,
    cfg: &PerceptionConfig,
    obs: &Observation,
) -> TickIngest {
    let mut out = TickIngest::default();
    let mut obs = obs.clone();

    // ── Phase 1: partial-observability mask ───────────────────────────────
    let mask_cfg = MaskConfig {
        prob: ctx.obs_mask_prob,
        seed: ctx.obs_mask_seed,
        verbose: ctx.obs_mask_verbose,
        protected_prefixes: cfg.protected_prefixes.clone(),
    };
    out.mask = apply_mask(&mut obs, &mask_cfg);

    // ── Phase 2: body map (proprioception) ────────────────────────────────
    let prev_posture = body.posture();
    body.update_from_observation(&obs, ctx);
    let new_posture = body.posture();

    // ── Phase 3: pred-err v0 ──────────────────────────────────────────────
    if let Some(expected) = ctx.pred_next_posture.take() {
        let err = body.posture_pred_err(&expected);
        ctx.record_pred_err(err);
    }

    // ── Phase 4: working-map mirror + SurfaceGrid ─────────────────────────
    if ctx.working_enabled {
        mirror_into_workingmap(wm, &obs);
        if ctx.working_mapsurface {
            let grid = compose_surfacegrid_v1(&obs.nav_patches, cfg.grid_w, cfg.grid_h);
            // Probe attention window widens the derivation disk.
            let boost = ctx
                .probe_boost_until_step
                .is_some_and(|until| ctx.controller_steps < until);
            let radius = cfg.slot_radius + i64::from(boost);
            let fams = derive_slot_families(&grid, None, radius, true);
            wm.write_slot_families(&fams);
            out.slot_families = Some(fams);
        }
        note_navpatch_ambiguities(wm, ctx, &obs.nav_patches);
    }

    // ── Phase 5: NavPatch engrams (content-addressed, deduped) ────────────
    out.navpatch_stores = store_navpatch_engrams(column, ctx, &obs.nav_patches);

    // ── Phase 6: stage/zone change detection ──────────────────────────────
    out.stage = obs.env_meta.scenario_stage.clone();
    out.zone = obs
        .env_meta
        .zone
        .clone()
        .or_else(|| Some(body.derive_zone()));

    out.stage_changed = match (&ctx.last_scenario_stage, &out.stage) {
        (Some(prev), Some(cur)) => prev != cur,
        (None, Some(_)) => false, // first sighting is a baseline, not a change
        _ => false,
    };
    out.zone_changed = match (&ctx.last_zone, &out.zone) {
        (Some(prev), Some(cur)) => prev != cur,
        _ => false,
    };

    // ── Phase 7: keyframe decision ────────────────────────────────────────
    ctx.steps_since_periodic_keyframe += 1;
    let derived_stood_up =
        prev_posture.as_deref() == Some("fallen") && new_posture.as_deref() == Some("standing");
    let input = KeyframeInput {
        stage_changed: out.stage_changed,
        zone_changed: out.zone_changed,
        milestones: &obs.env_meta.milestones,
        derived_stood_up,
        emotion_intensity: obs.env_meta.emotion.as_ref().map(|e| e.intensity),
        pred_err_streak: ctx.pred_err_streak(),
        sleeping_non_dreaming: obs.has_predicate("sleeping:non_dreaming"),
        sleeping_dreaming: obs.has_predicate("sleeping:dreaming"),
        steps_since_periodic: ctx.steps_since_periodic_keyframe,
    };
    out.keyframe_reasons = decide_keyframes(&ctx.keyframe, &input);
    out.keyframe = !out.keyframe_reasons.is_empty();

    if out.fired(KeyframeReason::Periodic)
        || (out.keyframe && ctx.keyframe.period_reset_on_any_keyframe)
    {
        ctx.steps_since_periodic_keyframe = 0;
    }

    // ── Phase 8: long-term write policy ───────────────────────────────────
    if ctx.longterm_obs_enabled {
        out.written = write_long_term(world, ctx, &obs, &out);
        if out.written > 0 {
            ctx.cog_cycles += 1;
        }
    }

    // Change-detection baselines advance regardless of write gating.
    if out.stage.is_some() {
        ctx.last_scenario_stage = out.stage.clone();
    }
    if out.zone.is_some() {
        ctx.last_zone = out.zone.clone();
    }

    out
}

// ── Working-map mirror ────────────────────────────────────────────────────────

/// Mirror the observation into the working map: SELF gets the observed
/// predicate families (overwrite-by-family) and cues; NavPatch entities get
/// scratch bindings.
fn mirror_into_workingmap(wm: &mut WorkingMap, obs: &Observation) {
    let self_id = wm.ensure_self();

    // Overwrite-by-family: drop SELF's old value in each observed family,
    // then write the new one.  Unobserved families persist.
    if let Some(b) = wm.graph_mut().binding_mut(self_id) {
        for token in &obs.predicates {
            let family = family_of(token).to_owned();
            b.tags.retain(|t| match t {
                capra_graph::Tag::Pred(local) => family_of(local) != family,
                _ => true,
            });
        }
    }
    for token in &obs.predicates {
        wm.add_entity_pred("self", token);
    }
    for cue in &obs.cues {
        wm.add_entity_cue("self", cue);
    }

    for patch in &obs.nav_patches {
        let Some(entity_id) = patch.entity_id.as_deref() else { continue };
        if entity_id == "self" {
            continue;
        }
        wm.ensure_entity(entity_id);
        if let Some(role) = patch.role.as_deref() {
            if let Some(bid) = wm.entity(entity_id) {
                if let Some(b) = wm.graph_mut().binding_mut(bid) {
                    b.meta.insert("role".to_owned(), json!(role));
                }
            }
        }
    }
}

/// Two same-entity patches with different signatures in one observation
/// can't both be right — park the ambiguity for the probe side-loop.
fn note_navpatch_ambiguities(wm: &mut WorkingMap, ctx: &mut Ctx, patches: &[NavPatch]) {
    for (i, a) in patches.iter().enumerate() {
        let Some(entity) = a.entity_id.as_deref() else { continue };
        for b in &patches[i + 1..] {
            if b.entity_id.as_deref() != Some(entity) {
                continue;
            }
            if navpatch_sig_v1(a) == navpatch_sig_v1(b) {
                continue;
            }
            let key = format!("navpatch:{entity}");
            wm.push_scratch(&key, "conflicting same-entity patches in one observation");
            if !ctx.wm_scratch_ambiguity.iter().any(|k| k == &key) {
                ctx.wm_scratch_ambiguity.push(key);
            }
        }
    }
}

// ── NavPatch engrams ──────────────────────────────────────────────────────────

/// Store each valid patch once per run: the signature → engram cache makes
/// repeats hit `dedup_cache` instead of allocating a new record.
fn store_navpatch_engrams(
    column: &mut ColumnMemory,
    ctx: &mut Ctx,
    patches: &[NavPatch],
) -> Vec<NavPatchStore> {
    let mut out = Vec::new();
    for patch in patches {
        let errors = grid_errors_v1(patch);
        if !errors.is_empty() {
            warn!(errors = ?errors, "skipping malformed navpatch");
            continue;
        }
        let sig = navpatch_sig_v1(patch);
        if let Some(&eid) = ctx.navpatch_sig_to_eid.get(&sig) {
            out.push(NavPatchStore { stored: false, reason: "dedup_cache", engram_id: eid, sig });
            continue;
        }

        let name = format!(
            "navpatch:{}",
            patch.entity_id.as_deref().unwrap_or("unknown")
        );
        let mut fact = FactMeta::named(&name)
            .with_attr("ticks", json!(ctx.ticks))
            .with_attr("tvec64", json!(ctx.tvec64()))
            .with_attr("sig16", json!(navpatch_sig16_v1(patch)));
        if let Some(epoch) = &ctx.boundary_vhash64 {
            fact = fact.with_attr("epoch_vhash64", json!(epoch));
        }
        let payload = serde_json::to_value(patch).unwrap_or_default();
        let eid = column.assert_fact(&name, payload, Some(fact));
        ctx.navpatch_sig_to_eid.insert(sig.clone(), eid);
        out.push(NavPatchStore { stored: true, reason: "stored", engram_id: eid, sig });
    }
    out
}

// ── Long-term writes ──────────────────────────────────────────────────────────

/// Gated long-term write.  Raw mode records every token; changes mode only
/// the changed slot families, or everything when a keyframe fired.
fn write_long_term(world: &mut WorldGraph, ctx: &mut Ctx, obs: &Observation, ingest: &TickIngest) -> usize {
    let mut written = 0usize;

    let write_meta = |ctx: &Ctx, ingest: &TickIngest| -> Meta {
        let mut meta = Meta::from([
            ("source".to_owned(), json!("obs")),
            ("ticks".to_owned(), json!(ctx.ticks)),
            ("tvec64".to_owned(), json!(ctx.tvec64())),
        ]);
        if ingest.keyframe {
            let reasons: Vec<&str> = ingest.keyframe_reasons.iter().map(|r| r.as_str()).collect();
            meta.insert("keyframe_reasons".to_owned(), json!(reasons));
        }
        meta
    };

    let tokens_to_write: Vec<&String> = match ctx.longterm_obs_mode {
        LongTermMode::Raw => obs.predicates.iter().collect(),
        LongTermMode::Changes => obs
            .predicates
            .iter()
            .filter(|token| {
                if ingest.keyframe {
                    return true;
                }
                let family = family_of(token).to_owned();
                ctx.last_slot_families.get(&family) != Some(*token)
            })
            .collect(),
    };

    for token in &tokens_to_write {
        match world.add_predicate(token, Attach::Latest, write_meta(ctx, ingest)) {
            Ok(_) => written += 1,
            Err(e) => warn!(token = token.as_str(), error = %e, "long-term predicate write skipped"),
        }
    }

    // Cues follow the same gating: raw mode records all of them, changes
    // mode records a cue when its family value is new or a keyframe fired.
    let cues_to_write: Vec<&String> = match ctx.longterm_obs_mode {
        LongTermMode::Raw => obs.cues.iter().collect(),
        LongTermMode::Changes => obs
            .cues
            .iter()
            .filter(|cue| {
                if ingest.keyframe {
                    return true;
                }
                let family = family_of(cue).to_owned();
                ctx.last_cue_families.get(&family) != Some(*cue)
            })
            .collect(),
    };
    for cue in &cues_to_write {
        match world.add_cue(cue, Attach::None, write_meta(ctx, ingest)) {
            Ok(_) => written += 1,
            Err(e) => warn!(token = cue.as_str(), error = %e, "long-term cue write skipped"),
        }
    }

    // Refresh the change-detection snapshots from the full observation.
    for token in &obs.predicates {
        ctx.last_slot_families
            .insert(family_of(token).to_owned(), (*token).clone());
    }
    for cue in &obs.cues {
        ctx.last_cue_families
            .insert(family_of(cue).to_owned(), (*cue).clone());
    }

    debug!(
        written,
        keyframe = ingest.keyframe,
        mode = ?ctx.longterm_obs_mode,
        "long-term write pass"
    );
    written
}
