//! `ColumnMemory` — the in-process engram store.
//!
//! Records are keyed by 32-hex [`EngramId`]s drawn from a seeded RNG, so a
//! run with the same seed produces the same ids.  The store never hands out
//! mutable access to stored records; callers retrieve full records and the
//! graph keeps only `{id, act}` pointers.

use chrono::Local;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use capra_core::EngramId;

use crate::error::{EngramError, EngramResult};
use crate::payload::FactMeta;

// ── Records ───────────────────────────────────────────────────────────────────

/// Meta block carried by every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    /// ISO-8601 local time, second precision.
    pub created_at: String,
    /// World-graph tokens this engram relates to.
    #[serde(default)]
    pub links: Vec<String>,
    /// Free-form attrs.  Always includes `column` (the owning column's
    /// name); temporal writers add `epoch`, `epoch_vhash64`, `ticks`,
    /// `tvec64`.
    #[serde(default)]
    pub attrs: serde_json::Map<String, Value>,
}

/// One stored engram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngramRecord {
    pub id: EngramId,
    pub name: String,
    pub payload: Value,
    pub meta: RecordMeta,
}

/// Filter for [`ColumnMemory::find`].  Empty query matches everything.
#[derive(Debug, Clone, Default)]
pub struct FindQuery<'a> {
    /// Substring match against the record name.
    pub name_contains: Option<&'a str>,
    /// Exact match against `attrs.epoch_vhash64` (string compare).
    pub epoch: Option<&'a str>,
    /// Require the named attr key to be present.
    pub has_attr: Option<&'a str>,
}

// ── ColumnMemory ──────────────────────────────────────────────────────────────

/// Stores one column's engrams in RAM and allocates their ids.
pub struct ColumnMemory {
    /// Column name, stamped into every record's `attrs.column`.
    pub name: String,
    records: FxHashMap<EngramId, EngramRecord>,
    id_rng: SmallRng,
}

impl ColumnMemory {
    pub fn new(name: &str, seed: u64) -> Self {
        ColumnMemory {
            name: name.to_owned(),
            records: FxHashMap::default(),
            id_rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Record a new engram and return its id.
    ///
    /// The record's attrs always end up with `column = <this column>`, even
    /// when the caller supplied their own attr map.
    pub fn assert_fact(&mut self, name: &str, payload: Value, meta: Option<FactMeta>) -> EngramId {
        let id = EngramId::random(&mut self.id_rng);
        let fm = meta.unwrap_or_else(|| FactMeta::named(name));
        let mut attrs = fm.attrs;
        attrs.insert("column".to_owned(), Value::String(self.name.clone()));
        let record = EngramRecord {
            id,
            name: name.to_owned(),
            payload,
            meta: RecordMeta {
                created_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
                links: fm.links,
                attrs,
            },
        };
        self.records.insert(id, record);
        id
    }

    /// Full record for `id`; [`EngramError::NotFound`] if absent.
    pub fn get(&self, id: EngramId) -> EngramResult<&EngramRecord> {
        self.records.get(&id).ok_or(EngramError::NotFound(id))
    }

    /// Full record for `id`, or `None`.
    pub fn try_get(&self, id: EngramId) -> Option<&EngramRecord> {
        self.records.get(&id)
    }

    pub fn exists(&self, id: EngramId) -> bool {
        self.records.contains_key(&id)
    }

    /// Remove a record; `true` if it existed.
    pub fn delete(&mut self, id: EngramId) -> bool {
        self.records.remove(&id).is_some()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All ids, sorted, for deterministic iteration and readouts.
    pub fn list_ids(&self) -> Vec<EngramId> {
        let mut ids: Vec<EngramId> = self.records.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Records matching `query`, in sorted-id order.
    pub fn find(&self, query: &FindQuery<'_>) -> Vec<&EngramRecord> {
        let mut hits: Vec<&EngramRecord> = self
            .records
            .values()
            .filter(|r| {
                if let Some(frag) = query.name_contains {
                    if !r.name.contains(frag) {
                        return false;
                    }
                }
                if let Some(epoch) = query.epoch {
                    match r.meta.attrs.get("epoch_vhash64").and_then(Value::as_str) {
                        Some(e) if e == epoch => {}
                        _ => return false,
                    }
                }
                if let Some(key) = query.has_attr {
                    if !r.meta.attrs.contains_key(key) {
                        return false;
                    }
                }
                true
            })
            .collect();
        hits.sort_by_key(|r| r.id);
        hits
    }
}
