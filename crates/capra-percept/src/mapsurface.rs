//! MapSurface engram lifecycle and auto-retrieve.
//!
//! The schematic working-map view can be snapshotted into column memory on
//! a keyframe and pulled back later when perception is struggling (a
//! pred-err signal at an episode boundary).  Retrieval is conservative:
//! priors merge under the live observation — an existing slot family on an
//! entity always wins, and a prior's cues never become WM cues (they
//! survive only as meta).

use serde_json::{json, Map, Value};
use tracing::debug;

use capra_core::{AutoretrieveMode, Ctx, EngramId};
use capra_engram::{ColumnMemory, EngramRecord, FactMeta, FindQuery};
use capra_graph::{Attach, EngramRef, Meta, Tag, WorldGraph};

use crate::workingmap::WorkingMap;

/// Cue tag carried by world-graph pointer bindings.
pub const MAPSURFACE_CUE: &str = "wm:mapsurface_snapshot";
/// Record name in column memory.
const MAPSURFACE_NAME: &str = "wm:mapsurface";
/// Column slot used for the pointer on the binding.
const COLUMN_SLOT: &str = "column01";

// ── Store ─────────────────────────────────────────────────────────────────────

/// Serialize the current MapSurface, write one engram, and attach a pointer
/// binding tagged `cue:wm:mapsurface_snapshot` to the long-term graph.
///
/// Returns the engram id.  If the pointer cue is rejected by the lexicon
/// the engram still exists and remains reachable by column scan.
pub fn store_mapsurface_snapshot(
    world: &mut WorldGraph,
    wm: &WorkingMap,
    column: &mut ColumnMemory,
    ctx: &Ctx,
    stage: Option<&str>,
    zone: Option<&str>,
) -> EngramId {
    let payload = serialize_mapsurface(wm, stage, zone);

    let mut fact = FactMeta::named(MAPSURFACE_NAME)
        .with_attr("ticks", json!(ctx.ticks))
        .with_attr("tvec64", json!(ctx.tvec64()));
    if let Some(stage) = stage {
        fact = fact.with_attr("stage", json!(stage));
    }
    if let Some(zone) = zone {
        fact = fact.with_attr("zone", json!(zone));
    }
    if let Some(epoch) = &ctx.boundary_vhash64 {
        fact = fact.with_attr("epoch_vhash64", json!(epoch));
    }

    let engram_id = column.assert_fact(MAPSURFACE_NAME, payload, Some(fact));

    let meta = Meta::from([
        ("source".to_owned(), json!("mapsurface_snapshot")),
        ("ticks".to_owned(), json!(ctx.ticks)),
    ]);
    match world.add_cue(MAPSURFACE_CUE, Attach::None, meta) {
        Ok(bid) => {
            // Both the binding and the engram were just created.
            let _ = world.attach_engram(bid, COLUMN_SLOT, EngramRef::new(engram_id));
        }
        Err(e) => debug!(error = %e, "mapsurface pointer binding rejected"),
    }

    engram_id
}

/// JSON projection of the working map: entities with positions, preds,
/// cues, and distance classes, plus inter-entity relations.
fn serialize_mapsurface(wm: &WorkingMap, stage: Option<&str>, zone: Option<&str>) -> Value {
    let mut entities = Map::new();
    for entity_id in wm.entity_ids() {
        let Some(bid) = wm.entity(entity_id) else { continue };
        let Some(b) = wm.graph().binding(bid) else { continue };

        let preds: Vec<&str> = b.tags.iter().filter(|t| t.is_pred()).map(Tag::local).collect();
        let cues: Vec<&str> = b.tags.iter().filter(|t| t.is_cue()).map(Tag::local).collect();
        let dist = distance_class(&preds);

        entities.insert(
            entity_id.to_owned(),
            json!({
                "pos": b.meta.get("pos").cloned().unwrap_or(Value::Null),
                "preds": preds,
                "cues": cues,
                "dist": dist,
            }),
        );
    }

    let mut relations: Vec<Value> = Vec::new();
    for b in wm.graph().bindings_sorted() {
        let Some(src) = b.meta.get("entity_id").and_then(Value::as_str) else { continue };
        for e in &b.edges {
            let Some(dst_b) = wm.graph().binding(e.to) else { continue };
            let Some(dst) = dst_b.meta.get("entity_id").and_then(Value::as_str) else { continue };
            relations.push(json!({"src": src, "label": e.label, "dst": dst}));
        }
    }

    json!({
        "schema": "wm_mapsurface_v1",
        "stage": stage,
        "zone": zone,
        "entities": entities,
        "relations": relations,
    })
}

/// Coarse distance class from proximity/hazard tokens.
fn distance_class(preds: &[&str]) -> Value {
    for p in preds {
        if p.ends_with(":close") || p.ends_with(":near") {
            return json!("near");
        }
        if p.ends_with(":far") {
            return json!("far");
        }
    }
    Value::Null
}

// ── Retrieve ──────────────────────────────────────────────────────────────────

/// Newest-first MapSurface records, preferring world pointer bindings.
///
/// Returns `(records, source)` where source is `"world_pointers"` when the
/// graph supplied the ids and `"column_scan"` otherwise.
pub fn iter_newest_mapsurface_recs<'a>(
    world: &WorldGraph,
    column: &'a ColumnMemory,
) -> (Vec<&'a EngramRecord>, &'static str) {
    let cue: Tag = Tag::cue(MAPSURFACE_CUE);
    let mut pointer_bids = world.bindings_with_tag(&cue);
    pointer_bids.reverse(); // newest binding id first

    let mut recs: Vec<&EngramRecord> = pointer_bids
        .iter()
        .filter_map(|bid| world.binding(*bid))
        .filter_map(|b| b.engrams.get(COLUMN_SLOT))
        .filter_map(|r| column.try_get(r.id))
        .collect();

    if !recs.is_empty() {
        return (recs, "world_pointers");
    }

    recs = column.find(&FindQuery { name_contains: Some(MAPSURFACE_NAME), ..Default::default() });
    // No pointer ordering available: newest created_at first, id as tie-break.
    recs.sort_by(|a, b| {
        b.meta
            .created_at
            .cmp(&a.meta.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    (recs, "column_scan")
}

/// Pick the best prior for the current context.
///
/// Candidates are the newest `top_k` records minus `exclude`.  Ranking:
/// `(stage, zone)` match count first, then salience overlap with the
/// current WM (exact pred tokens matched on `self`), then recency.
pub fn pick_best_mapsurface_rec<'a>(
    world: &WorldGraph,
    column: &'a ColumnMemory,
    wm: &WorkingMap,
    stage: Option<&str>,
    zone: Option<&str>,
    top_k: usize,
    exclude: Option<EngramId>,
) -> Option<&'a EngramRecord> {
    let (recs, source) = iter_newest_mapsurface_recs(world, column);
    debug!(candidates = recs.len(), source, "mapsurface retrieval");

    let current_self: Vec<String> = wm.entity_preds("self");

    let scored = recs
        .into_iter()
        .filter(|r| exclude != Some(r.id))
        .take(top_k.max(1))
        .enumerate()
        .map(|(recency_rank, rec)| {
            let ctx_match = stage_zone_match(rec, stage, zone);
            let salience = salience_overlap(&rec.payload, &current_self);
            (ctx_match, salience, recency_rank, rec)
        });

    // Max by (match, salience), min recency_rank — newest wins ties.
    scored
        .max_by(|a, b| {
            (a.0, a.1, std::cmp::Reverse(a.2)).cmp(&(b.0, b.1, std::cmp::Reverse(b.2)))
        })
        .map(|(_, _, _, rec)| rec)
}

fn stage_zone_match(rec: &EngramRecord, stage: Option<&str>, zone: Option<&str>) -> u8 {
    let attr = |key: &str| rec.meta.attrs.get(key).and_then(Value::as_str);
    let mut score = 0;
    if stage.is_some() && attr("stage") == stage {
        score += 1;
    }
    if zone.is_some() && attr("zone") == zone {
        score += 1;
    }
    score
}

/// Count of exact pred tokens the prior's `self` entity shares with the
/// current WM self.
fn salience_overlap(payload: &Value, current_self: &[String]) -> usize {
    let Some(preds) = payload
        .get("entities")
        .and_then(|e| e.get("self"))
        .and_then(|s| s.get("preds"))
        .and_then(Value::as_array)
    else {
        return 0;
    };
    preds
        .iter()
        .filter_map(Value::as_str)
        .filter(|p| current_self.iter().any(|c| c == p))
        .count()
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// What a prior merge actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub entities_added: usize,
    pub preds_added: usize,
    /// Prior values ignored because the entity already had that slot family.
    pub skipped_existing_family: usize,
    /// Prior cues preserved as `prior_cues` meta (never as WM tags).
    pub cues_preserved_as_meta: usize,
    pub relations_added: usize,
}

/// Merge a retrieved MapSurface payload into the working map.
///
/// Rules: an existing slot family on an entity is never overwritten; no
/// `cue:*` tag is ever written (prior cues land in `prior_cues` meta); new
/// non-conflicting entities and relations may be added.
pub fn merge_mapsurface_into_workingmap(wm: &mut WorkingMap, prior: &Value) -> MergeReport {
    let mut report = MergeReport::default();

    let Some(entities) = prior.get("entities").and_then(Value::as_object) else {
        return report;
    };

    for (entity_id, entry) in entities {
        let existed = wm.entity(entity_id).is_some();
        if !existed {
            wm.ensure_entity(entity_id);
            report.entities_added += 1;
        }

        if let Some(preds) = entry.get("preds").and_then(Value::as_array) {
            for token in preds.iter().filter_map(Value::as_str) {
                if wm.entity_has_family(entity_id, token) {
                    report.skipped_existing_family += 1;
                    continue;
                }
                wm.add_entity_pred(entity_id, token);
                report.preds_added += 1;
            }
        }

        if let Some(pos) = entry.get("pos").filter(|p| !p.is_null()) {
            if let Some(bid) = wm.entity(entity_id) {
                if let Some(b) = wm.graph_mut().binding_mut(bid) {
                    b.meta.entry("pos".to_owned()).or_insert_with(|| pos.clone());
                }
            }
        }

        let prior_cues: Vec<Value> = entry
            .get("cues")
            .and_then(Value::as_array)
            .map(|c| c.to_vec())
            .unwrap_or_default();
        if !prior_cues.is_empty() {
            report.cues_preserved_as_meta += prior_cues.len();
            if let Some(bid) = wm.entity(entity_id) {
                if let Some(b) = wm.graph_mut().binding_mut(bid) {
                    b.meta.insert("prior_cues".to_owned(), Value::Array(prior_cues));
                }
            }
        }
    }

    if let Some(relations) = prior.get("relations").and_then(Value::as_array) {
        for rel in relations {
            let (Some(src), Some(dst), Some(label)) = (
                rel.get("src").and_then(Value::as_str),
                rel.get("dst").and_then(Value::as_str),
                rel.get("label").and_then(Value::as_str),
            ) else {
                continue;
            };
            let (Some(src_bid), Some(dst_bid)) = (wm.entity(src), wm.entity(dst)) else {
                continue;
            };
            if src_bid == dst_bid {
                continue;
            }
            let already = wm
                .graph()
                .binding(src_bid)
                .is_some_and(|b| b.edges.iter().any(|e| e.to == dst_bid && e.label == label));
            if already {
                continue;
            }
            let meta = Meta::from([("source".to_owned(), json!("mapsurface_prior"))]);
            if wm.graph_mut().add_edge(src_bid, dst_bid, label, meta, false).is_ok() {
                report.relations_added += 1;
            }
        }
    }

    report
}

// ── Auto-retrieve guard ───────────────────────────────────────────────────────

/// Verdict of [`should_autoretrieve_mapsurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoretrieveDecision {
    pub ok: bool,
    /// Machine-readable reason (`disabled`, `not_boundary`,
    /// `enabled_boundary_pred_err`, …).
    pub why: &'static str,
    pub mode: AutoretrieveMode,
    /// Clamped to `[1, 10]`.
    pub top_k: usize,
}

/// Decide whether a keyframe should trigger MapSurface auto-retrieve.
pub fn should_autoretrieve_mapsurface(
    ctx: &Ctx,
    keyframe_taken: bool,
    stage_changed: bool,
    zone_changed: bool,
) -> AutoretrieveDecision {
    let mode = ctx.wm_mapsurface_autoretrieve_mode;
    let top_k = ctx.wm_mapsurface_autoretrieve_top_k.clamp(1, 10);

    if !ctx.wm_mapsurface_autoretrieve_enabled {
        return AutoretrieveDecision { ok: false, why: "disabled", mode, top_k };
    }
    if !keyframe_taken {
        return AutoretrieveDecision { ok: false, why: "not_boundary", mode, top_k };
    }
    if ctx.pred_err_last.map(|e| e.posture) == Some(1) {
        return AutoretrieveDecision { ok: true, why: "enabled_boundary_pred_err", mode, top_k };
    }
    if stage_changed || zone_changed {
        return AutoretrieveDecision { ok: true, why: "enabled_boundary_stage_zone", mode, top_k };
    }
    AutoretrieveDecision { ok: false, why: "no_signal", mode, top_k }
}
