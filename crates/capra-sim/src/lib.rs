//! `capra-sim` — the agent runtime and tick loop.
//!
//! One tick is an end-to-end synchronous pass: observation → perception →
//! working-map compose → long-term write gating (+ optional MapSurface
//! auto-retrieve) → policy selection/execution → ledger and soft-clock
//! update.  The core is single-threaded cooperative; all I/O (snapshots,
//! tick logs) happens between ticks.
//!
//! Ownership: the [`Runtime`] owns the world graph, working map, body map,
//! engram column, drives, skills, and context, and is the only mutator of
//! each.  Policies receive the long-term graph and drives; perception
//! mutates the body/working maps and context; no component reaches into
//! another's state.
//!
//! # Crate layout
//!
//! | Module       | Contents                                        |
//! |--------------|-------------------------------------------------|
//! | [`env`]      | `Environment` boundary trait                    |
//! | [`runtime`]  | `Runtime` + `tick()` orchestration              |
//! | [`observer`] | `RunObserver` callbacks, `NoopObserver`         |
//! | [`jsonl`]    | per-tick JSONL writer                           |
//! | [`snapshot`] | session snapshot persistence (atomic rename)    |
//! | [`boot`]     | world seeding helpers                           |
//! | [`error`]    | `SimError`, `SimResult<T>`                      |

pub mod boot;
pub mod env;
pub mod error;
pub mod jsonl;
pub mod observer;
pub mod runtime;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use boot::boot_prime_stand;
pub use env::{Environment, Info};
pub use error::{SimError, SimResult};
pub use jsonl::JsonlTickWriter;
pub use observer::{NoopObserver, RunObserver};
pub use runtime::{Runtime, RunSummary, TickReport};
pub use snapshot::SessionSnapshot;
