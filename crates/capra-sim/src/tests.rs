//! Unit tests for the runtime shell (boot, persistence, tick log).

#[cfg(test)]
mod boot {
    use capra_graph::WorldGraph;

    use crate::boot::boot_prime_stand;

    #[test]
    fn seeds_now_and_stand_once() {
        let mut world = WorldGraph::new();
        let (now, stand) = boot_prime_stand(&mut world).unwrap();
        assert_eq!(world.now(), Some(now));
        assert_eq!(world.plan_to_predicate(now, "stand").unwrap().last(), Some(&stand));

        // Second call reuses the existing seed.
        let (now2, stand2) = boot_prime_stand(&mut world).unwrap();
        assert_eq!((now, stand), (now2, stand2));
        assert_eq!(world.len(), 2);
        assert!(world.check_invariants().is_empty());
    }
}

#[cfg(test)]
mod snapshot {
    use tempfile::tempdir;

    use crate::runtime::Runtime;
    use capra_graph::Attach;

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut rt = Runtime::new(1);
        crate::boot::boot_prime_stand(&mut rt.world).unwrap();
        rt.drives.hunger = 0.95;
        rt.skills.record("policy:stand_up", 1.0, true);
        rt.save_snapshot(&path).unwrap();

        // No stray temp file is left behind.
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let mut restored = Runtime::new(2);
        restored.load_snapshot(&path).unwrap();
        assert_eq!(restored.world.len(), rt.world.len());
        assert_eq!(restored.drives.hunger, 0.95);
        assert_eq!(restored.skills.get("policy:stand_up").unwrap().n, 1);

        // Restored id counter allocates fresh ids.
        let fresh = restored
            .world
            .add_predicate("alert", Attach::None, Default::default())
            .unwrap();
        assert!(fresh.number() > 2);
    }

    #[test]
    fn corrupt_snapshot_leaves_runtime_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{definitely not json").unwrap();

        let mut rt = Runtime::new(1);
        crate::boot::boot_prime_stand(&mut rt.world).unwrap();
        let before = rt.world.len();

        let err = rt.load_snapshot(&path).unwrap_err();
        assert!(matches!(err, crate::SimError::Snapshot(_)));
        assert_eq!(rt.world.len(), before);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let mut rt = Runtime::new(1);
        let err = rt.load_snapshot(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, crate::SimError::Io(_)));
    }

    #[test]
    fn snapshot_shape_matches_contract() {
        let rt = Runtime::new(1);
        let value = serde_json::to_value(rt.snapshot()).unwrap();
        for key in ["saved_at", "app_version", "platform", "world", "drives", "skills"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["saved_at"].as_str().unwrap().len(), 19);
        assert!(value["world"].get("bindings").is_some());
    }
}

#[cfg(test)]
mod scenarios {
    use capra_core::Drives;
    use capra_graph::{Attach, Meta, Planner, Tag, WorldGraph};
    use capra_percept::{
        store_mapsurface_snapshot, EnvMeta, Observation, WorkingMap,
    };

    use crate::boot::boot_prime_stand;
    use crate::env::{Environment, Info};
    use crate::observer::NoopObserver;
    use crate::runtime::Runtime;

    fn obs(predicates: &[&str], cues: &[&str], step: u64) -> Observation {
        Observation {
            predicates: predicates.iter().map(|s| (*s).to_owned()).collect(),
            cues: cues.iter().map(|s| (*s).to_owned()).collect(),
            env_meta: EnvMeta { step_index: Some(step), ..Default::default() },
            ..Default::default()
        }
    }

    /// Stand-up on birth: boot seed + high hunger, one tick fires
    /// `policy:stand_up`, appends the posture chain, and lands fatigue at
    /// exactly 0.25.
    #[test]
    fn s1_stand_up_on_birth() {
        let mut rt = Runtime::new(11);
        boot_prime_stand(&mut rt.world).unwrap();
        rt.drives = Drives { hunger: 0.95, fatigue: 0.2, warmth: 0.6 };

        let report = rt.tick(&obs(&[], &[], 0));

        assert_eq!(report.outcome.policy.as_deref(), Some("policy:stand_up"));
        assert_eq!(report.outcome.reward, 1.0);
        assert!((rt.drives.fatigue - 0.25).abs() < 1e-12);
        assert!(rt.world.any_binding_has_tag(&Tag::action("push_up")));
        assert!(rt.world.any_binding_has_tag(&Tag::action("extend_legs")));
        assert!(rt.world.any_binding_has_tag(&Tag::pred("posture:standing")));
        assert!(rt.world.check_invariants().is_empty());
    }

    /// Seek nipple when standing: the next tick sees the standing posture
    /// plus a mom cue and fires `policy:seek_nipple` for +0.5.
    #[test]
    fn s2_seek_nipple_when_standing() {
        let mut rt = Runtime::new(11);
        boot_prime_stand(&mut rt.world).unwrap();
        rt.drives = Drives { hunger: 0.95, fatigue: 0.2, warmth: 0.6 };

        rt.tick(&obs(&[], &[], 0)); // stand up

        let report = rt.tick(&obs(
            &["posture:standing"],
            &["vision:silhouette:mom"],
            1,
        ));

        assert_eq!(report.outcome.policy.as_deref(), Some("policy:seek_nipple"));
        assert_eq!(report.outcome.reward, 0.5);
        assert!(rt.world.any_binding_has_tag(&Tag::pred("state:seeking_mom")));
    }

    /// Safety override: a fallen posture near NOW preempts resting no
    /// matter how exhausted the agent is.
    #[test]
    fn s3_safety_override_beats_rest() {
        let mut rt = Runtime::new(11);
        rt.world.ensure_anchor("NOW");
        rt.drives = Drives { hunger: 0.1, fatigue: 0.95, warmth: 0.6 };

        let report = rt.tick(&obs(&["posture:fallen"], &["vestibular:fall"], 0));

        let fired = report.outcome.policy.as_deref().unwrap();
        assert!(
            fired == "policy:recover_fall" || fired == "policy:stand_up",
            "override must restrict to recovery, got {fired}"
        );
    }

    /// Dijkstra beats BFS on weighted edges: the 2-hop/cost-6 route loses
    /// to the 3-hop/cost-3 route under Dijkstra.
    #[test]
    fn s4_dijkstra_wins_over_bfs() {
        let mut world = WorldGraph::new();
        let now = world.ensure_anchor("NOW");
        let meta_w = |w: f64| Meta::from([("weight".to_owned(), serde_json::json!(w))]);

        let x = world.add_predicate("alert", Attach::None, Meta::new()).unwrap();
        let a = world.add_predicate("resting", Attach::None, Meta::new()).unwrap();
        let b = world.add_predicate("seeking_mom", Attach::None, Meta::new()).unwrap();
        let goal = world.add_predicate("nipple:found", Attach::None, Meta::new()).unwrap();

        world.add_edge(now, x, "then", meta_w(5.0), false).unwrap();
        world.add_edge(x, goal, "then", meta_w(1.0), false).unwrap();
        world.add_edge(now, a, "then", meta_w(1.0), false).unwrap();
        world.add_edge(a, b, "then", meta_w(1.0), false).unwrap();
        world.add_edge(b, goal, "then", meta_w(1.0), false).unwrap();

        world.set_planner(Planner::Bfs);
        assert_eq!(world.plan_to_predicate(now, "nipple:found").unwrap(), vec![now, x, goal]);

        world.set_planner(Planner::Dijkstra);
        assert_eq!(
            world.plan_to_predicate(now, "nipple:found").unwrap(),
            vec![now, a, b, goal]
        );
    }

    /// Planner env knob: `CAPRA_PLANNER` selects the initial strategy and
    /// invalid values are ignored.
    #[test]
    fn s4b_planner_env_selects_initial_strategy() {
        // SAFETY: single-threaded mutation window; the var is removed
        // before any other graph in this test is built.
        unsafe { std::env::set_var("CAPRA_PLANNER", "dijkstra") };
        let g = WorldGraph::new();
        unsafe { std::env::remove_var("CAPRA_PLANNER") };
        assert_eq!(g.planner(), Planner::Dijkstra);

        unsafe { std::env::set_var("CAPRA_PLANNER", "a-star") };
        let g = WorldGraph::new();
        unsafe { std::env::remove_var("CAPRA_PLANNER") };
        assert_eq!(g.planner(), Planner::Bfs, "invalid values fall back to bfs");
    }

    /// NavPatch dedup across two ticks: one engram in column memory, the
    /// signature cache maps to it, and the second store reports
    /// `dedup_cache`.
    #[test]
    fn s5_navpatch_dedup_in_one_run() {
        use capra_grid::{Cell, NavPatch};

        let mut rt = Runtime::new(11);
        boot_prime_stand(&mut rt.world).unwrap();

        let mut cells = vec![Cell::Unknown; 25];
        cells[7] = Cell::Hazard;
        let patch = NavPatch::new("cliff", "obstacle", 5, 5, cells);

        let mut o = obs(&["posture:standing"], &[], 0);
        o.nav_patches = vec![patch.clone()];
        let first = rt.tick(&o);

        let mut o = obs(&["posture:standing"], &[], 1);
        o.nav_patches = vec![patch];
        let second = rt.tick(&o);

        let stores_1 = &first.ingest.navpatch_stores;
        let stores_2 = &second.ingest.navpatch_stores;
        assert!(stores_1[0].stored);
        assert!(!stores_2[0].stored);
        assert_eq!(stores_2[0].reason, "dedup_cache");
        assert_eq!(stores_1[0].engram_id, stores_2[0].engram_id);

        let navpatch_engrams = rt
            .column
            .find(&capra_engram::FindQuery { name_contains: Some("navpatch:"), ..Default::default() });
        assert_eq!(navpatch_engrams.len(), 1);
        assert_eq!(
            rt.ctx.navpatch_sig_to_eid.get(&stores_1[0].sig),
            Some(&stores_1[0].engram_id)
        );
    }

    /// Keyframe auto-retrieve: a stage change with a fresh pred-err signal
    /// retrieves the matching prior without clobbering the cliff slot.
    #[test]
    fn s6_keyframe_autoretrieve_merges_prior() {
        let mut rt = Runtime::new(11);
        boot_prime_stand(&mut rt.world).unwrap();
        rt.ctx.wm_mapsurface_autoretrieve_enabled = true;

        // Baseline tick in the first stage.
        let mut o = obs(&["posture:standing"], &[], 0);
        o.env_meta.scenario_stage = Some("first_stand".to_owned());
        rt.tick(&o);

        // A prior from the target (stage, zone), carrying a near-cliff.
        let mut prior_wm = WorkingMap::new();
        prior_wm.add_entity_pred("cliff", "hazard:cliff:near");
        prior_wm.add_entity_pred("mom", "proximity:mom:far");
        store_mapsurface_snapshot(
            &mut rt.world,
            &prior_wm,
            &mut rt.column,
            &rt.ctx,
            Some("first_latch"),
            Some("open"),
        );

        // Live WM already knows the cliff is far.
        rt.working.add_entity_pred("cliff", "hazard:cliff:far");

        // Stage change + posture expectation violated this tick.
        rt.ctx.pred_next_posture = Some("standing".to_owned());
        let mut o = obs(&["posture:fallen"], &[], 1);
        o.env_meta.scenario_stage = Some("first_latch".to_owned());
        let report = rt.tick(&o);

        assert!(report.ingest.keyframe);
        let auto = report.autoretrieve.expect("guard should approve retrieval");
        assert_eq!(auto.why, "enabled_boundary_pred_err");

        // Existing cliff slot family wins over the prior's value.
        assert_eq!(
            rt.working.entity_preds("cliff"),
            vec!["hazard:cliff:far".to_owned()]
        );
        // Non-conflicting prior content arrives.
        assert_eq!(
            rt.working.entity_preds("mom"),
            vec!["proximity:mom:far".to_owned()]
        );
    }

    // ── Scripted environment loop ─────────────────────────────────────────

    /// Minimal scripted storyboard for loop tests.
    struct Storyboard {
        script: Vec<Observation>,
        cursor: usize,
    }

    impl Environment for Storyboard {
        fn reset(&mut self, _seed: Option<u64>) -> (Observation, Info) {
            self.cursor = 0;
            (self.script[0].clone(), Info::new())
        }

        fn step(
            &mut self,
            action: Option<&str>,
            _ctx: &mut capra_core::Ctx,
        ) -> (Observation, f64, bool, Info) {
            self.cursor += 1;
            let done = self.cursor >= self.script.len();
            let next = if done {
                Observation::default()
            } else {
                self.script[self.cursor].clone()
            };
            let reward = if action.is_some() { 0.1 } else { 0.0 };
            (next, reward, done, Info::new())
        }
    }

    #[test]
    fn run_loop_drives_the_storyboard() {
        let mut rt = Runtime::new(11);
        boot_prime_stand(&mut rt.world).unwrap();
        rt.drives.hunger = 0.95;

        let mut env = Storyboard {
            script: vec![
                obs(&[], &[], 0),
                obs(&["posture:standing"], &["vision:silhouette:mom"], 1),
                obs(&["posture:standing", "mom:close"], &[], 2),
            ],
            cursor: 0,
        };

        let summary = rt.run(&mut env, 10, &mut NoopObserver).unwrap();

        assert_eq!(summary.ticks, 3);
        assert!(summary.policies_fired >= 2);
        assert!(summary.env_reward > 0.0);
        assert!(rt.world.any_binding_has_tag(&Tag::pred("posture:standing")));
        assert!(rt.world.any_binding_has_tag(&Tag::pred("state:seeking_mom")));
        assert_eq!(rt.ctx.controller_steps, 3);
    }
}

#[cfg(test)]
mod jsonl {
    use tempfile::tempdir;

    use crate::jsonl::JsonlTickWriter;
    use crate::observer::RunObserver;
    use crate::runtime::Runtime;
    use capra_percept::Observation;

    #[test]
    fn one_row_per_tick() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");
        let mut writer = JsonlTickWriter::create(&path).unwrap();

        let mut rt = Runtime::new(3);
        crate::boot::boot_prime_stand(&mut rt.world).unwrap();
        for step in 0..3u64 {
            let mut obs = Observation::with_predicates(&["alert"]);
            obs.env_meta.step_index = Some(step);
            let report = rt.tick(&obs);
            writer.on_tick_end(&report);
        }
        writer.finish().unwrap();
        assert!(writer.take_error().is_none());

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            let row: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(row.get("tick").is_some());
            assert!(row.get("status").is_some());
            assert!(row.get("hunger").is_some());
        }
    }
}
