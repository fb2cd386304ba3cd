//! `capra-core` — foundational types for the `capra` agent runtime.
//!
//! This crate is a dependency of every other `capra-*` crate.  It
//! intentionally has no `capra-*` dependencies and minimal external ones
//! (`rand`/`rand_distr`, `rustc-hash`, `thiserror`, `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                 |
//! |--------------|----------------------------------------------------------|
//! | [`ids`]      | `BindingId` (`"b<N>"`), `EngramId` (32-hex)              |
//! | [`rng`]      | `RunRng` (seeded), `mask_rng` derivation                 |
//! | [`temporal`] | `TemporalContext` — unit-norm soft clock                 |
//! | [`drives`]   | `Drives` (hunger / fatigue / warmth) + flag thresholds   |
//! | [`ctx`]      | `Ctx` — runtime configuration knobs and counters         |
//! | [`error`]    | `CoreError`, `CoreResult`                                |

pub mod ctx;
pub mod drives;
pub mod error;
pub mod ids;
pub mod rng;
pub mod temporal;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ctx::{AutoretrieveMode, Ctx, KeyframeConfig, LongTermMode, PredErr};
pub use drives::{Drives, FATIGUE_HIGH, HUNGER_HIGH, WARMTH_LOW};
pub use error::{CoreError, CoreResult};
pub use ids::{BindingId, EngramId};
pub use rng::{mask_rng, RunRng};
pub use temporal::{cosine, dot, TemporalContext};
