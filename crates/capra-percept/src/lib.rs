//! `capra-percept` — the perception → working-map → long-term pipeline.
//!
//! One tick of perception is a synchronous pass: the raw observation is
//! masked (partial observability), mirrored into the proprioceptive
//! [`BodyMap`] and the scratch [`WorkingMap`], composed into a SurfaceGrid
//! whose derived slot families land on the MapSurface SELF binding, and
//! finally gated into the long-term world graph (every tick in raw mode,
//! change/keyframe-gated otherwise).
//!
//! Perception is fault-tolerant: a malformed NavPatch is skipped, an
//! out-of-lexicon token under a strict tag policy is dropped with a
//! warning, and nothing here ever aborts the tick.
//!
//! # Crate layout
//!
//! | Module          | Contents                                          |
//! |-----------------|---------------------------------------------------|
//! | [`observation`] | `Observation` / `EnvMeta` wire contract           |
//! | [`mask`]        | partial-observability masking                     |
//! | [`bodymap`]     | proprioception slot graph                         |
//! | [`workingmap`]  | per-tick scratch graph + MapSurface SELF          |
//! | [`keyframe`]    | keyframe gating                                   |
//! | [`mapsurface`]  | MapSurface engram lifecycle + auto-retrieve guard |
//! | [`pipeline`]    | per-tick ingestion orchestration                  |

pub mod bodymap;
pub mod keyframe;
pub mod mapsurface;
pub mod mask;
pub mod observation;
pub mod pipeline;
pub mod workingmap;

#[cfg(test)]
mod tests;

pub use bodymap::BodyMap;
pub use keyframe::{decide_keyframes, KeyframeInput, KeyframeReason};
pub use mapsurface::{
    merge_mapsurface_into_workingmap, pick_best_mapsurface_rec, should_autoretrieve_mapsurface,
    store_mapsurface_snapshot, AutoretrieveDecision, MergeReport, MAPSURFACE_CUE,
};
pub use mask::{apply_mask, MaskConfig, MaskOutcome};
pub use observation::{Emotion, EnvMeta, Observation};
pub use pipeline::{ingest_observation, NavPatchStore, PerceptionConfig, TickIngest};
pub use workingmap::WorkingMap;
