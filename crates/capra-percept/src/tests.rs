//! Unit tests for the perception pipeline.

use capra_core::Ctx;
use capra_engram::ColumnMemory;
use capra_graph::WorldGraph;

use crate::bodymap::BodyMap;
use crate::observation::{EnvMeta, Observation};
use crate::pipeline::{ingest_observation, PerceptionConfig};
use crate::workingmap::WorkingMap;

/// Everything one pipeline test needs, wired with a fixed seed.
struct Rig {
    world: WorldGraph,
    wm: WorkingMap,
    body: BodyMap,
    column: ColumnMemory,
    ctx: Ctx,
    cfg: PerceptionConfig,
}

impl Rig {
    fn new() -> Self {
        Rig {
            world: WorldGraph::new(),
            wm: WorkingMap::new(),
            body: BodyMap::new(),
            column: ColumnMemory::new("column01", 7),
            ctx: Ctx::new(7),
            cfg: PerceptionConfig::default(),
        }
    }

    fn ingest(&mut self, obs: &Observation) -> crate::pipeline::TickIngest {
        ingest_observation(
            &mut self.world,
            &mut self.wm,
            &mut self.body,
            &mut self.column,
            &mut self.ctx,
            &self.cfg,
            obs,
        )
    }
}

fn obs_at_step(predicates: &[&str], cues: &[&str], step: u64) -> Observation {
    Observation {
        predicates: predicates.iter().map(|s| (*s).to_owned()).collect(),
        cues: cues.iter().map(|s| (*s).to_owned()).collect(),
        env_meta: EnvMeta { step_index: Some(step), ..Default::default() },
        ..Default::default()
    }
}

#[cfg(test)]
mod mask {
    use super::obs_at_step;
    use crate::mask::{apply_mask, MaskConfig};

    #[test]
    fn zero_probability_is_a_strict_noop() {
        let mut obs = obs_at_step(&["posture:standing", "alert"], &["scent:milk"], 3);
        let before = obs.clone();
        let outcome = apply_mask(&mut obs, &MaskConfig::default());
        assert_eq!(obs, before);
        assert_eq!(outcome.dropped_predicates, 0);
        assert_eq!(outcome.dropped_cues, 0);
    }

    #[test]
    fn full_probability_keeps_protected_prefixes() {
        let mut obs = obs_at_step(
            &["posture:standing", "hazard:cliff:near", "proximity:shelter:far", "alert"],
            &["scent:milk", "sound:bleat:mom"],
            5,
        );
        let cfg = MaskConfig { prob: 1.0, ..Default::default() };
        apply_mask(&mut obs, &cfg);
        assert_eq!(
            obs.predicates,
            vec!["posture:standing", "hazard:cliff:near", "proximity:shelter:far"]
        );
        assert!(obs.cues.is_empty());
    }

    #[test]
    fn all_dropped_keeps_first_original_predicate() {
        let mut obs = obs_at_step(&["alert", "resting"], &[], 5);
        let cfg = MaskConfig { prob: 1.0, ..Default::default() };
        apply_mask(&mut obs, &cfg);
        assert_eq!(obs.predicates, vec!["alert"]);
    }

    #[test]
    fn same_seed_and_step_reproduce() {
        let make = || obs_at_step(&["alert", "resting", "seeking_mom"], &["scent:milk"], 11);
        let cfg = MaskConfig { prob: 0.5, seed: 42, ..Default::default() };

        let mut a = make();
        let mut b = make();
        apply_mask(&mut a, &cfg);
        apply_mask(&mut b, &cfg);
        assert_eq!(a, b);

        // A different step reference may (and for this seed, does) differ.
        let mut c = make();
        c.env_meta.step_index = Some(12);
        apply_mask(&mut c, &cfg);
        let mut d = make();
        d.env_meta.step_index = Some(12);
        apply_mask(&mut d, &cfg);
        assert_eq!(c, d);
    }
}

#[cfg(test)]
mod bodymap {
    use super::*;

    #[test]
    fn slots_overwrite_to_observed_values() {
        let mut body = BodyMap::new();
        let mut ctx = Ctx::new(0);

        body.update_from_observation(&Observation::with_predicates(&["posture:fallen"]), &mut ctx);
        assert!(body.is_fallen());

        body.update_from_observation(
            &Observation::with_predicates(&["posture:standing", "proximity:mom:close"]),
            &mut ctx,
        );
        assert!(body.is_standing());
        assert!(body.mom_close());
        // Unmentioned slots persist.
        assert!(!body.is_fallen());
    }

    #[test]
    fn update_records_staleness_reference() {
        let mut body = BodyMap::new();
        let mut ctx = Ctx::new(0);
        ctx.controller_steps = 9;
        body.update_from_observation(&Observation::with_predicates(&["posture:standing"]), &mut ctx);
        assert_eq!(ctx.bodymap_last_update_step, Some(9));
        assert!(!ctx.bodymap_is_stale(3));
        ctx.controller_steps = 13;
        assert!(ctx.bodymap_is_stale(3));
    }

    #[test]
    fn zone_derivation_prefers_cliff() {
        let mut body = BodyMap::new();
        let mut ctx = Ctx::new(0);
        assert_eq!(body.derive_zone(), "open");

        body.update_from_observation(
            &Observation::with_predicates(&["hazard:cliff:near", "proximity:shelter:near"]),
            &mut ctx,
        );
        assert_eq!(body.derive_zone(), "cliff_edge");

        body.update_from_observation(&Observation::with_predicates(&["hazard:cliff:far"]), &mut ctx);
        assert_eq!(body.derive_zone(), "shelter");
    }

    #[test]
    fn posture_pred_err_bit() {
        let mut body = BodyMap::new();
        let mut ctx = Ctx::new(0);
        assert_eq!(body.posture_pred_err("standing"), 1); // nothing observed yet
        body.update_from_observation(&Observation::with_predicates(&["posture:standing"]), &mut ctx);
        assert_eq!(body.posture_pred_err("standing"), 0);
        assert_eq!(body.posture_pred_err("fallen"), 1);
    }
}

#[cfg(test)]
mod workingmap {
    use capra_grid::{Dir8, SlotFamilies};

    use crate::workingmap::{family_of, WorkingMap};

    #[test]
    fn family_extraction() {
        assert_eq!(family_of("hazard:cliff:near"), "hazard:cliff");
        assert_eq!(family_of("posture:standing"), "posture");
        assert_eq!(family_of("resting"), "resting");
    }

    #[test]
    fn slot_families_overwrite_only_their_prefixes() {
        let mut wm = WorkingMap::new();
        wm.add_entity_pred("self", "posture:standing");

        wm.write_slot_families(&SlotFamilies {
            hazard_near: true,
            traversable_near: true,
            goal_dir: Some(Dir8::E),
        });
        let preds = wm.entity_preds("self");
        assert!(preds.contains(&"hazard:near".to_owned()));
        assert!(preds.contains(&"terrain:traversable_near".to_owned()));
        assert!(preds.contains(&"goal:dir:E".to_owned()));
        assert!(preds.contains(&"posture:standing".to_owned()));

        // False values remove; unrelated tags survive.
        wm.write_slot_families(&SlotFamilies::default());
        let preds = wm.entity_preds("self");
        assert!(!preds.iter().any(|p| p.starts_with("hazard:")));
        assert!(!preds.iter().any(|p| p.starts_with("goal:dir:")));
        assert!(preds.contains(&"posture:standing".to_owned()));
    }

    #[test]
    fn derived_facts_are_never_cues() {
        let mut wm = WorkingMap::new();
        wm.write_slot_families(&SlotFamilies { hazard_near: true, ..Default::default() });
        let bid = wm.entity("self").unwrap();
        assert!(wm.graph().binding(bid).unwrap().tags.iter().all(|t| !t.is_cue()));
    }

    #[test]
    fn scratch_is_idempotent_per_key() {
        let mut wm = WorkingMap::new();
        wm.push_scratch("navpatch:cliff", "conflict");
        wm.push_scratch("navpatch:cliff", "conflict again");
        assert_eq!(wm.scratch().len(), 1);
        assert!(wm.resolve_scratch("navpatch:cliff"));
        assert!(wm.scratch().is_empty());
    }
}

#[cfg(test)]
mod keyframes {
    use capra_core::KeyframeConfig;

    use crate::keyframe::{decide_keyframes, KeyframeInput, KeyframeReason};

    #[test]
    fn stage_and_zone_changes_fire() {
        let cfg = KeyframeConfig::default();
        let input = KeyframeInput { stage_changed: true, zone_changed: true, ..Default::default() };
        let reasons = decide_keyframes(&cfg, &input);
        assert!(reasons.contains(&KeyframeReason::StageChange));
        assert!(reasons.contains(&KeyframeReason::ZoneChange));
    }

    #[test]
    fn periodic_fires_on_cadence_and_respects_sleep_suppression() {
        let mut cfg = KeyframeConfig { period_steps: 4, ..Default::default() };
        let mut input = KeyframeInput { steps_since_periodic: 4, ..Default::default() };
        assert!(decide_keyframes(&cfg, &input).contains(&KeyframeReason::Periodic));

        input.steps_since_periodic = 3;
        assert!(!decide_keyframes(&cfg, &input).contains(&KeyframeReason::Periodic));

        cfg.period_suppress_when_sleeping_non_dreaming = true;
        input.steps_since_periodic = 4;
        input.sleeping_non_dreaming = true;
        assert!(!decide_keyframes(&cfg, &input).contains(&KeyframeReason::Periodic));

        // Dreaming sleep is not suppressed unless its own flag is set.
        input.sleeping_non_dreaming = false;
        input.sleeping_dreaming = true;
        assert!(decide_keyframes(&cfg, &input).contains(&KeyframeReason::Periodic));
    }

    #[test]
    fn pred_err_streak_threshold() {
        let cfg = KeyframeConfig::default(); // min streak 2
        let mut input = KeyframeInput { pred_err_streak: 1, ..Default::default() };
        assert!(!decide_keyframes(&cfg, &input).contains(&KeyframeReason::PredErrStreak));
        input.pred_err_streak = 2;
        assert!(decide_keyframes(&cfg, &input).contains(&KeyframeReason::PredErrStreak));
    }

    #[test]
    fn milestone_explicit_and_derived() {
        let cfg = KeyframeConfig::default();
        let milestones = vec!["stood_up".to_owned()];
        let input = KeyframeInput { milestones: &milestones, ..Default::default() };
        assert!(decide_keyframes(&cfg, &input).contains(&KeyframeReason::Milestone));

        let input = KeyframeInput { derived_stood_up: true, ..Default::default() };
        assert!(decide_keyframes(&cfg, &input).contains(&KeyframeReason::Milestone));
    }

    #[test]
    fn emotion_threshold_is_inclusive() {
        let cfg = KeyframeConfig::default(); // threshold 0.85
        let input = KeyframeInput { emotion_intensity: Some(0.85), ..Default::default() };
        assert!(decide_keyframes(&cfg, &input).contains(&KeyframeReason::Emotion));
        let input = KeyframeInput { emotion_intensity: Some(0.84), ..Default::default() };
        assert!(!decide_keyframes(&cfg, &input).contains(&KeyframeReason::Emotion));
    }
}

#[cfg(test)]
mod pipeline {
    use super::*;
    use capra_core::LongTermMode;
    use capra_grid::{Cell, NavPatch};
    use serde_json::json;

    fn patch(entity: &str, hazard_at: (usize, usize)) -> NavPatch {
        let mut cells = vec![Cell::Unknown; 25];
        cells[hazard_at.1 * 5 + hazard_at.0] = Cell::Hazard;
        NavPatch::new(entity, "obstacle", 5, 5, cells)
    }

    #[test]
    fn changes_mode_skips_unchanged_families() {
        let mut rig = Rig::new();
        let obs = obs_at_step(&["posture:standing"], &[], 0);

        let first = rig.ingest(&obs);
        assert_eq!(first.written, 1);

        let second = rig.ingest(&obs);
        assert_eq!(second.written, 0, "unchanged family must not rewrite");

        let third = rig.ingest(&obs_at_step(&["posture:fallen"], &[], 2));
        assert_eq!(third.written, 1);
    }

    #[test]
    fn raw_mode_writes_every_tick() {
        let mut rig = Rig::new();
        rig.ctx.longterm_obs_mode = LongTermMode::Raw;
        let obs = obs_at_step(&["posture:standing"], &["scent:milk"], 0);
        assert_eq!(rig.ingest(&obs).written, 2);
        assert_eq!(rig.ingest(&obs).written, 2);
    }

    #[test]
    fn stage_change_fires_keyframe_and_writes() {
        let mut rig = Rig::new();
        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.env_meta.scenario_stage = Some("first_stand".to_owned());
        rig.ingest(&obs);

        // Same stage: no keyframe.
        let again = rig.ingest(&obs);
        assert!(!again.keyframe);

        obs.env_meta.scenario_stage = Some("first_latch".to_owned());
        let changed = rig.ingest(&obs);
        assert!(changed.keyframe);
        assert!(changed.fired(crate::keyframe::KeyframeReason::StageChange));
        // Keyframe forces the (unchanged) posture family through.
        assert_eq!(changed.written, 1);
    }

    #[test]
    fn navpatch_dedup_across_ticks() {
        let mut rig = Rig::new();
        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.nav_patches = vec![patch("cliff", (3, 2))];

        let first = rig.ingest(&obs);
        assert_eq!(first.navpatch_stores.len(), 1);
        assert!(first.navpatch_stores[0].stored);
        let eid = first.navpatch_stores[0].engram_id;

        let second = rig.ingest(&obs);
        assert_eq!(second.navpatch_stores.len(), 1);
        assert!(!second.navpatch_stores[0].stored);
        assert_eq!(second.navpatch_stores[0].reason, "dedup_cache");
        assert_eq!(second.navpatch_stores[0].engram_id, eid);

        // Exactly one engram in the column, and the cache maps sig → id.
        assert_eq!(rig.column.count(), 1);
        assert_eq!(
            rig.ctx.navpatch_sig_to_eid.get(&first.navpatch_stores[0].sig),
            Some(&eid)
        );
    }

    #[test]
    fn malformed_patches_are_skipped_not_fatal() {
        let mut rig = Rig::new();
        let mut bad = patch("cliff", (0, 0));
        bad.grid_cells.pop();
        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.nav_patches = vec![bad];

        let ingest = rig.ingest(&obs);
        assert!(ingest.navpatch_stores.is_empty());
        assert_eq!(rig.column.count(), 0);
        assert_eq!(ingest.written, 1); // the tick itself proceeded
    }

    #[test]
    fn surface_grid_slot_families_reach_self() {
        let mut rig = Rig::new();
        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.nav_patches = vec![patch("cliff", (3, 2))]; // within r=2 of center
        let ingest = rig.ingest(&obs);

        assert!(ingest.slot_families.as_ref().unwrap().hazard_near);
        let preds = rig.wm.entity_preds("self");
        assert!(preds.contains(&"hazard:near".to_owned()));
    }

    #[test]
    fn pred_err_is_recorded_and_consumed() {
        let mut rig = Rig::new();
        rig.ctx.pred_next_posture = Some("standing".to_owned());
        rig.ingest(&obs_at_step(&["posture:fallen"], &[], 0));
        assert_eq!(rig.ctx.pred_err_last.map(|e| e.posture), Some(1));
        assert!(rig.ctx.pred_next_posture.is_none());

        rig.ctx.pred_next_posture = Some("fallen".to_owned());
        rig.ingest(&obs_at_step(&["posture:fallen"], &[], 1));
        assert_eq!(rig.ctx.pred_err_last.map(|e| e.posture), Some(0));
    }

    #[test]
    fn ambiguous_same_entity_patches_park_scratch() {
        let mut rig = Rig::new();
        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.nav_patches = vec![patch("cliff", (0, 0)), patch("cliff", (4, 4))];
        rig.ingest(&obs);
        assert_eq!(rig.wm.scratch().len(), 1);
        assert_eq!(rig.ctx.wm_scratch_ambiguity, vec!["navpatch:cliff".to_owned()]);
    }

    #[test]
    fn periodic_counter_resets_on_any_keyframe_when_configured() {
        let mut rig = Rig::new();
        rig.ctx.keyframe.period_steps = 10;
        rig.ctx.keyframe.period_reset_on_any_keyframe = true;

        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.env_meta.scenario_stage = Some("a".to_owned());
        rig.ingest(&obs);
        assert_eq!(rig.ctx.steps_since_periodic_keyframe, 1);

        obs.env_meta.scenario_stage = Some("b".to_owned());
        let changed = rig.ingest(&obs);
        assert!(changed.keyframe);
        assert_eq!(rig.ctx.steps_since_periodic_keyframe, 0);
    }

    #[test]
    fn disabled_longterm_writes_nothing() {
        let mut rig = Rig::new();
        rig.ctx.longterm_obs_enabled = false;
        let ingest = rig.ingest(&obs_at_step(&["posture:standing"], &[], 0));
        assert_eq!(ingest.written, 0);
        assert!(rig.world.is_empty());
    }

    #[test]
    fn keyframe_reason_meta_lands_on_written_bindings() {
        let mut rig = Rig::new();
        let mut obs = obs_at_step(&["posture:standing"], &[], 0);
        obs.env_meta.scenario_stage = Some("a".to_owned());
        rig.ingest(&obs);
        obs.env_meta.scenario_stage = Some("b".to_owned());
        rig.ingest(&obs);

        let latest = rig.world.latest().unwrap();
        let meta = &rig.world.binding(latest).unwrap().meta;
        assert_eq!(meta["keyframe_reasons"], json!(["stage_change"]));
    }
}

#[cfg(test)]
mod mapsurface {
    use super::*;
    use crate::mapsurface::{
        merge_mapsurface_into_workingmap, pick_best_mapsurface_rec, should_autoretrieve_mapsurface,
        store_mapsurface_snapshot,
    };
    use capra_core::AutoretrieveMode;
    use capra_graph::Tag;
    use serde_json::json;

    #[test]
    fn store_attaches_pointer_binding() {
        let mut rig = Rig::new();
        rig.wm.add_entity_pred("self", "posture:standing");
        let eid = store_mapsurface_snapshot(
            &mut rig.world,
            &rig.wm,
            &mut rig.column,
            &rig.ctx,
            Some("first_stand"),
            Some("open"),
        );

        assert!(rig.column.exists(eid));
        let pointers = rig.world.bindings_with_tag(&Tag::cue("wm:mapsurface_snapshot"));
        assert_eq!(pointers.len(), 1);
        let b = rig.world.binding(pointers[0]).unwrap();
        assert_eq!(b.engrams.get("column01").unwrap().id, eid);
        assert_eq!(b.engrams.get("column01").unwrap().act, 1.0);
    }

    #[test]
    fn pick_best_prefers_matching_stage_zone_and_salience() {
        let mut rig = Rig::new();

        rig.wm.add_entity_pred("self", "posture:standing");
        store_mapsurface_snapshot(&mut rig.world, &rig.wm, &mut rig.column, &rig.ctx, Some("a"), Some("open"));

        rig.wm.add_entity_pred("self", "hazard:near");
        let matching = store_mapsurface_snapshot(
            &mut rig.world,
            &rig.wm,
            &mut rig.column,
            &rig.ctx,
            Some("b"),
            Some("cliff_edge"),
        );

        let best = pick_best_mapsurface_rec(
            &rig.world,
            &rig.column,
            &rig.wm,
            Some("b"),
            Some("cliff_edge"),
            5,
            None,
        )
        .unwrap();
        assert_eq!(best.id, matching);
    }

    #[test]
    fn exclude_skips_that_engram() {
        let mut rig = Rig::new();
        let only = store_mapsurface_snapshot(&mut rig.world, &rig.wm, &mut rig.column, &rig.ctx, None, None);
        let picked = pick_best_mapsurface_rec(&rig.world, &rig.column, &rig.wm, None, None, 5, Some(only));
        assert!(picked.is_none());
    }

    #[test]
    fn merge_never_clobbers_existing_slot_family_or_writes_cues() {
        let mut rig = Rig::new();
        rig.wm.add_entity_pred("cliff", "hazard:cliff:far");

        let prior = json!({
            "schema": "wm_mapsurface_v1",
            "entities": {
                "cliff": {"pos": [2.0, 1.0], "preds": ["hazard:cliff:near"], "cues": ["terrain:rocky"], "dist": "near"},
                "mom": {"pos": null, "preds": ["proximity:mom:far"], "cues": [], "dist": "far"}
            },
            "relations": [{"src": "cliff", "label": "beside", "dst": "mom"}]
        });

        let report = merge_mapsurface_into_workingmap(&mut rig.wm, &prior);

        // Existing hazard:cliff family wins over the prior's value.
        assert_eq!(rig.wm.entity_preds("cliff"), vec!["hazard:cliff:far".to_owned()]);
        assert_eq!(report.skipped_existing_family, 1);

        // New entity and relation arrive.
        assert_eq!(report.entities_added, 1);
        assert_eq!(rig.wm.entity_preds("mom"), vec!["proximity:mom:far".to_owned()]);
        assert_eq!(report.relations_added, 1);

        // Cues survive only as meta.
        assert_eq!(report.cues_preserved_as_meta, 1);
        let cliff = rig.wm.entity("cliff").unwrap();
        let b = rig.wm.graph().binding(cliff).unwrap();
        assert!(b.tags.iter().all(|t| !t.is_cue()));
        assert_eq!(b.meta["prior_cues"], json!(["terrain:rocky"]));
    }

    #[test]
    fn autoretrieve_guard_decisions() {
        let mut ctx = Ctx::new(0);

        let d = should_autoretrieve_mapsurface(&ctx, true, true, false);
        assert!(!d.ok);
        assert_eq!(d.why, "disabled");

        ctx.wm_mapsurface_autoretrieve_enabled = true;
        let d = should_autoretrieve_mapsurface(&ctx, false, true, false);
        assert!(!d.ok);
        assert_eq!(d.why, "not_boundary");

        ctx.record_pred_err(1);
        let d = should_autoretrieve_mapsurface(&ctx, true, false, false);
        assert!(d.ok);
        assert_eq!(d.why, "enabled_boundary_pred_err");
        assert_eq!(d.mode, AutoretrieveMode::Merge);
        assert!(d.top_k >= 1 && d.top_k <= 10);

        ctx.wm_mapsurface_autoretrieve_top_k = 99;
        let d = should_autoretrieve_mapsurface(&ctx, true, false, false);
        assert_eq!(d.top_k, 10);
    }
}
