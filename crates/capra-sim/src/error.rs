//! Runtime error type.

use thiserror::Error;

/// Errors surfaced by the runtime and its persistence layer.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot parse/shape problems, surfaced to the caller.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Graph(#[from] capra_graph::GraphError),
}

/// Shorthand result type for runtime operations.
pub type SimResult<T> = Result<T, SimError>;
