//! `capra-engram` — content-addressed column memory.
//!
//! Bindings in the world graph stay small and symbolic; anything heavy (a
//! scene vector, a NavPatch grid, a MapSurface snapshot) is asserted here
//! as an *engram* and referenced from the graph by pointer only.
//!
//! # Crate layout
//!
//! | Module      | Contents                                               |
//! |-------------|--------------------------------------------------------|
//! | [`payload`] | `TensorPayload` (+ binary codec), `FactMeta`           |
//! | [`store`]   | `ColumnMemory` — in-RAM record store, id allocation    |
//! | [`error`]   | `EngramError`, `EngramResult<T>`                       |

pub mod error;
pub mod payload;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{EngramError, EngramResult};
pub use payload::{FactMeta, TensorPayload};
pub use store::{ColumnMemory, EngramRecord, FindQuery, RecordMeta};
