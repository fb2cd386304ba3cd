//! Grid error type.

use thiserror::Error;

/// Errors raised by NavPatch validation and grid construction.
#[derive(Debug, Error)]
pub enum GridError {
    /// A patch failed `grid_v1` validation; the payload lists the problems.
    #[error("invalid navpatch payload: {0}")]
    InvalidPayload(String),
}

/// Shorthand result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;
