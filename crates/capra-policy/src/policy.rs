//! The `Policy` trait and execution outcome types.

use capra_core::{BindingId, Ctx, Drives};
use capra_graph::{GraphResult, WorldGraph};
use capra_percept::BodyMap;

/// How a policy execution ended.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PolicyStatus {
    Ok,
    Fail,
    Noop,
    Error,
}

impl PolicyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyStatus::Ok => "ok",
            PolicyStatus::Fail => "fail",
            PolicyStatus::Noop => "noop",
            PolicyStatus::Error => "error",
        }
    }
}

/// Result of one action-center step.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// `policy:<name>` of the fired policy, `None` when nothing matched.
    pub policy: Option<String>,
    pub status: PolicyStatus,
    pub reward: f64,
    pub notes: String,
    /// Final binding of the appended chain, when one was written.
    pub binding: Option<BindingId>,
}

impl Outcome {
    pub fn no_match() -> Self {
        Outcome {
            policy: None,
            status: PolicyStatus::Noop,
            reward: 0.0,
            notes: "no triggers matched".to_owned(),
            binding: None,
        }
    }
}

/// One innate behaviour.
///
/// Implementations must keep `trigger` read-only and cheap — it runs for
/// every loaded policy every tick.  `execute` appends a small chain of
/// bindings/edges to the long-term graph, stamps provenance
/// (`meta.policy` on bindings, `meta.created_by` on edges), applies drive
/// side-effects, and reports an [`Outcome`].  Errors from `execute` are
/// contained by the runtime; they never unwind the tick.
pub trait Policy {
    /// Stable `policy:<name>` identifier.
    fn name(&self) -> &'static str;

    /// Developmental gate: may this policy be loaded at all right now?
    fn dev_gate(&self, _ctx: &Ctx) -> bool {
        true
    }

    /// Should this policy fire this tick?
    fn trigger(&self, world: &WorldGraph, body: &BodyMap, drives: &Drives, ctx: &Ctx) -> bool;

    /// Run the behaviour.  Only the long-term graph and the drives may be
    /// mutated (plus expectation fields on `ctx`).
    fn execute(&self, world: &mut WorldGraph, ctx: &mut Ctx, drives: &mut Drives) -> GraphResult<Outcome>;

    /// One-line human explanation of the trigger conditions.
    fn explain(&self) -> &'static str {
        ""
    }
}
