//! Unit tests for capra-core primitives.

#[cfg(test)]
mod ids {
    use crate::{BindingId, EngramId};

    #[test]
    fn binding_id_display_roundtrip() {
        let id = BindingId(42);
        assert_eq!(id.to_string(), "b42");
        assert_eq!("b42".parse::<BindingId>().unwrap(), id);
    }

    #[test]
    fn binding_id_rejects_garbage() {
        assert!("42".parse::<BindingId>().is_err());
        assert!("bx".parse::<BindingId>().is_err());
        assert!("".parse::<BindingId>().is_err());
    }

    #[test]
    fn binding_id_serde_string_form() {
        let json = serde_json::to_string(&BindingId(7)).unwrap();
        assert_eq!(json, "\"b7\"");
        let back: BindingId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BindingId(7));
    }

    #[test]
    fn engram_id_hex_roundtrip() {
        let id = EngramId([0xab; 16]);
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        assert_eq!(s.parse::<EngramId>().unwrap(), id);
    }

    #[test]
    fn engram_id_random_is_seeded() {
        use crate::RunRng;
        let a = EngramId::random(&mut RunRng::new(9));
        let b = EngramId::random(&mut RunRng::new(9));
        assert_eq!(a, b);
    }
}

#[cfg(test)]
mod rng {
    use crate::{mask_rng, RunRng};
    use rand::Rng;

    #[test]
    fn deterministic_same_seed() {
        let mut r1 = RunRng::new(12345);
        let mut r2 = RunRng::new(12345);
        for _ in 0..100 {
            let a: f64 = r1.random();
            let b: f64 = r2.random();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn children_diverge() {
        let mut root = RunRng::new(1);
        let mut c0 = root.child(0);
        let mut c1 = root.child(1);
        let a: u64 = c0.random();
        let b: u64 = c1.random();
        assert_ne!(a, b);
    }

    #[test]
    fn mask_rng_reproducible_per_step() {
        let mut a = mask_rng(5, 17);
        let mut b = mask_rng(5, 17);
        let mut c = mask_rng(5, 18);
        let xa: u64 = a.r#gen();
        let xb: u64 = b.r#gen();
        let xc: u64 = c.r#gen();
        assert_eq!(xa, xb);
        assert_ne!(xa, xc);
    }

    #[test]
    fn gen_bool_extremes() {
        let mut rng = RunRng::new(0);
        assert!(!rng.gen_bool(0.0));
        assert!(rng.gen_bool(1.0));
    }
}

#[cfg(test)]
mod temporal {
    use crate::{cosine, dot, TemporalContext};

    fn norm(v: &[f64]) -> f64 {
        dot(v, v).sqrt()
    }

    #[test]
    fn starts_unit_norm() {
        let t = TemporalContext::new(8, 0.02, 0.25, 42);
        assert!((norm(&t.vector()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn step_drifts_a_little() {
        let mut t = TemporalContext::new(64, 0.02, 0.25, 42);
        let v0 = t.vector();
        let v1 = t.step();
        assert!((norm(&v1) - 1.0).abs() < 1e-9);
        let c = cosine(&v0, &v1);
        assert!(c > 0.95, "drift should be small, cos = {c}");
    }

    #[test]
    fn boundary_jumps_more_than_step() {
        let mut a = TemporalContext::new(64, 0.02, 0.25, 7);
        let mut b = TemporalContext::new(64, 0.02, 0.25, 7);
        let v0 = a.vector();
        let after_step = a.step();
        let after_jump = b.boundary();
        assert!(cosine(&v0, &after_step) > cosine(&v0, &after_jump));
        assert_eq!(b.boundary_no, 1);
    }

    #[test]
    fn same_seed_replays() {
        let mut a = TemporalContext::new(16, 0.02, 0.25, 3);
        let mut b = TemporalContext::new(16, 0.02, 0.25, 3);
        a.step();
        b.step();
        assert_eq!(a.vector(), b.vector());
        assert_eq!(a.tvec64(), b.tvec64());
    }

    #[test]
    fn tvec64_is_16_hex_chars() {
        let t = TemporalContext::with_defaults(11);
        let h = t.tvec64();
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[cfg(test)]
mod drives {
    use crate::Drives;

    #[test]
    fn flag_thresholds_are_strict() {
        let d = Drives { hunger: 0.60, fatigue: 0.70, warmth: 0.30 };
        assert!(d.flag_tags().is_empty());

        let d = Drives { hunger: 0.61, fatigue: 0.71, warmth: 0.29 };
        assert_eq!(
            d.flag_tags(),
            vec!["drive:hunger_high", "drive:fatigue_high", "drive:cold"]
        );
    }

    #[test]
    fn adjust_clamps() {
        let mut d = Drives::default();
        d.adjust_fatigue(5.0);
        assert_eq!(d.fatigue, 1.0);
        d.adjust_fatigue(-5.0);
        assert_eq!(d.fatigue, 0.0);
    }

    #[test]
    fn serde_roundtrip() {
        let d = Drives { hunger: 0.95, fatigue: 0.25, warmth: 0.5 };
        let json = serde_json::to_string(&d).unwrap();
        let back: Drives = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}

#[cfg(test)]
mod ctx {
    use crate::{AutoretrieveMode, Ctx};

    #[test]
    fn defaults_match_contract() {
        let ctx = Ctx::new(0);
        assert_eq!(ctx.obs_mask_prob, 0.0);
        assert!(ctx.obs_mask_verbose);
        assert!(ctx.longterm_obs_enabled);
        assert!(ctx.working_enabled);
        assert!(ctx.working_mapsurface);
        assert!(!ctx.wm_mapsurface_autoretrieve_enabled);
        assert_eq!(ctx.wm_mapsurface_autoretrieve_top_k, 5);
        assert_eq!(ctx.keyframe.pred_err_min_streak, 2);
        assert_eq!(ctx.keyframe.emotion_threshold, 0.85);
        assert!(!ctx.rl_enabled);
        assert_eq!(ctx.temporal.dim, 128);
    }

    #[test]
    fn boundary_records_epoch_fingerprint() {
        let mut ctx = Ctx::new(1);
        assert!(ctx.cos_to_last_boundary().is_none());
        ctx.take_boundary();
        assert!(ctx.boundary_vhash64.is_some());
        let c = ctx.cos_to_last_boundary().unwrap();
        assert!((c - 1.0).abs() < 1e-9, "fresh boundary should be self-similar");
        assert_eq!(ctx.temporal.boundary_no, 1);
    }

    #[test]
    fn pred_err_streak_counts_trailing_ones() {
        let mut ctx = Ctx::new(2);
        for e in [1, 0, 1, 1] {
            ctx.record_pred_err(e);
        }
        assert_eq!(ctx.pred_err_streak(), 2);
        ctx.record_pred_err(0);
        assert_eq!(ctx.pred_err_streak(), 0);
    }

    #[test]
    fn bodymap_staleness() {
        let mut ctx = Ctx::new(3);
        assert!(ctx.bodymap_is_stale(10));
        ctx.bodymap_last_update_step = Some(0);
        ctx.controller_steps = 5;
        assert!(!ctx.bodymap_is_stale(10));
        ctx.controller_steps = 11;
        assert!(ctx.bodymap_is_stale(10));
    }

    #[test]
    fn autoretrieve_mode_parse_lossy() {
        assert_eq!(AutoretrieveMode::parse_lossy("REPLACE"), AutoretrieveMode::Replace);
        assert_eq!(AutoretrieveMode::parse_lossy(" merge "), AutoretrieveMode::Merge);
        assert_eq!(AutoretrieveMode::parse_lossy("bogus"), AutoretrieveMode::Merge);
    }
}
