//! Graph error type.
//!
//! Unknown ids always fail loudly — they are never silently created.  Write
//! operations validate before mutating, so a returned error leaves the
//! graph unchanged.

use capra_core::BindingId;
use thiserror::Error;

/// Errors raised by world-graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown binding {0}")]
    UnknownBinding(BindingId),

    /// Self-loop without explicit allowance, or similar malformed edge.
    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    /// Out-of-lexicon tag rejected under the strict tag policy.
    #[error("tag {tag:?} not allowed at stage {stage}")]
    InvalidTag { tag: String, stage: crate::lexicon::Stage },

    #[error("unknown developmental stage {0:?}")]
    UnknownStage(String),

    #[error("unknown planner strategy {0:?} (expected \"bfs\" or \"dijkstra\")")]
    UnknownPlanner(String),

    #[error("unknown memory mode {0:?} (expected \"episodic\" or \"semantic\")")]
    UnknownMemoryMode(String),

    /// Invariant violations or an unreadable snapshot.
    #[error("graph corrupt: {0}")]
    Corrupt(String),
}

/// Shorthand result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
