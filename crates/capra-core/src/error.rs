//! Core error type.
//!
//! Sub-crates define their own error enums (graph, grid, engram, sim) and
//! wrap or convert `CoreError` where it surfaces.  Keeping one enum per
//! crate keeps error sites small and the kinds distinct.

use thiserror::Error;

/// Errors raised by `capra-core` primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An id string did not match its wire form (`"b<N>"` or 32-char hex).
    #[error("malformed id: {0:?}")]
    BadId(String),
}

/// Shorthand result type for `capra-core` operations.
pub type CoreResult<T> = Result<T, CoreError>;
