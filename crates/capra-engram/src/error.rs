//! Engram error type.

use capra_core::EngramId;
use thiserror::Error;

/// Errors raised by column memory and payload codecs.
#[derive(Debug, Error)]
pub enum EngramError {
    #[error("engram {0} not found")]
    NotFound(EngramId),

    /// Binary payload did not start with the expected magic.
    #[error("bad payload magic")]
    BadMagic,

    /// Binary payload carried an unsupported codec version.
    #[error("unsupported payload version {0}")]
    BadVersion(u32),

    /// Binary payload ended before its declared contents.
    #[error("truncated payload: needed {needed} bytes, had {have}")]
    Truncated { needed: usize, have: usize },
}

/// Shorthand result type for engram operations.
pub type EngramResult<T> = Result<T, EngramError>;
