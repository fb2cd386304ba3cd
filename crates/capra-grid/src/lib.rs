//! `capra-grid` — NavPatch grids and SurfaceGrid composition.
//!
//! NavPatches are small, explicit *topological* grids describing local
//! navigational structure around the agent.  Everything here is v1-simple
//! and deterministic:
//!
//! - A NavPatch carries a JSON-safe `grid_v1` payload with small integer
//!   cell codes.
//! - The working map's SurfaceGrid is composed once per tick by overlaying
//!   active patches (no transforms in v1; patches are already SELF-local).
//! - A tiny set of grid-derived slot families (`hazard:near`,
//!   `terrain:traversable_near`, optional `goal:dir`) feeds cheap policy
//!   gating.
//!
//! Design stance: cell *codes* are semantic labels; the overlay rule is a
//! safety policy — blockers and hazards win over goals.  Signatures exclude
//! volatile fields (local ids, observation payloads, diagnostic layers), so
//! logically identical patches hash identically across runs and platforms.
//!
//! # Crate layout
//!
//! | Module      | Contents                                              |
//! |-------------|-------------------------------------------------------|
//! | [`cell`]    | `Cell` codes + overlay priority + ASCII glyphs        |
//! | [`patch`]   | `NavPatch` wire schema + `grid_errors_v1` validator   |
//! | [`sig`]     | SHA-1 v1 signatures over a canonical JSON core        |
//! | [`surface`] | `SurfaceGrid` compose / render                        |
//! | [`derive`]  | grid-derived slot families, overlap metric            |

pub mod cell;
pub mod derive;
pub mod error;
pub mod patch;
pub mod sig;
pub mod surface;


pub use cell::{Cell, GRID_ENCODING_V1};
pub use derive::{derive_slot_families, overlap_fraction, Dir8, SlotFamilies};
pub use error::{GridError, GridResult};
pub use patch::{grid_errors_v1, NavPatch};
pub use sig::{navpatch_sig16_v1, navpatch_sig_v1};
pub use surface::{compose_surfacegrid_v1, SurfaceGrid};
