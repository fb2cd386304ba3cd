//! Deterministic NavPatch signatures (v1).
//!
//! The signature is SHA-1 over a canonical JSON serialization of a minimal
//! core: sorted keys, compact separators, UTF-8 (no ASCII escaping).
//! `serde_json`'s default map is ordered by key, so building the core from
//! `serde_json::Map`s yields the sorted-key form directly.
//!
//! Volatile fields (`local_id`, `obs`, `layers`, `match`, `sig16`, any
//! unrecognized key) never enter the core; reordering or duplicating tags
//! doesn't change the hash; changing any grid cell or dimension does.

use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use crate::patch::NavPatch;

/// Full 40-hex v1 signature for a patch.
pub fn navpatch_sig_v1(patch: &NavPatch) -> String {
    let core = signature_core(patch);
    sha1_hex(&Value::Object(core))
}

/// Convenience: first 16 hex chars of [`navpatch_sig_v1`].
pub fn navpatch_sig16_v1(patch: &NavPatch) -> String {
    let mut s = navpatch_sig_v1(patch);
    s.truncate(16);
    s
}

pub(crate) fn sha1_hex(core: &Value) -> String {
    // serde_json emits compact separators and raw UTF-8, matching the
    // canonical form the signature is defined over.
    let payload = serde_json::to_string(core).unwrap_or_default();
    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

fn signature_core(patch: &NavPatch) -> Map<String, Value> {
    let mut core = Map::new();

    let schema = if patch.schema.is_empty() {
        "navpatch_v1".to_owned()
    } else {
        patch.schema.clone()
    };
    core.insert("schema".to_owned(), Value::String(schema));
    core.insert("role".to_owned(), opt_str(&patch.role));
    core.insert("frame".to_owned(), opt_str(&patch.frame));
    core.insert("entity_id".to_owned(), opt_str(&patch.entity_id));

    if let Some(tags) = &patch.tags {
        let normalized = sorted_unique_strs(tags);
        core.insert(
            "tags".to_owned(),
            Value::Array(normalized.into_iter().map(Value::String).collect()),
        );
    }

    if let Some(extent) = &patch.extent {
        if extent.values().all(is_scalar) {
            core.insert("extent".to_owned(), Value::Object(extent.clone()));
        }
    }

    core.insert("grid_encoding_v".to_owned(), Value::String(patch.grid_encoding_v.clone()));
    core.insert("grid_w".to_owned(), Value::from(patch.grid_w));
    core.insert("grid_h".to_owned(), Value::from(patch.grid_h));
    core.insert(
        "grid_cells".to_owned(),
        Value::Array(patch.grid_cells.iter().map(|&c| Value::from(c)).collect()),
    );

    core
}

fn opt_str(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Sorted, deduped, trimmed, non-empty copies of `xs`.
fn sorted_unique_strs(xs: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for x in xs {
        let s = x.trim();
        if s.is_empty() || out.iter().any(|seen| seen == s) {
            continue;
        }
        out.push(s.to_owned());
    }
    out.sort();
    out
}
