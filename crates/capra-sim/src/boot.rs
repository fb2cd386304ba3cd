//! World seeding helpers.

use capra_core::BindingId;
use capra_graph::{Attach, GraphResult, Meta, WorldGraph};

/// Seed a fresh world for the birth scenario: a NOW anchor plus a `stand`
/// intent linked `NOW --initiate_stand--> stand`.
///
/// Returns `(now, stand)`.  Idempotent enough for test reuse — the anchor
/// is ensured, and the seed is only added when no `stand` predicate is
/// reachable yet.
pub fn boot_prime_stand(world: &mut WorldGraph) -> GraphResult<(BindingId, BindingId)> {
    let now = world.ensure_anchor("NOW");

    if let Some(path) = world.plan_to_predicate(now, "stand") {
        if let Some(&stand) = path.last() {
            return Ok((now, stand));
        }
    }

    let meta = Meta::from([("source".to_owned(), serde_json::json!("boot"))]);
    let stand = world.add_predicate("stand", Attach::None, meta.clone())?;
    world.add_edge(now, stand, "initiate_stand", meta, false)?;
    Ok((now, stand))
}
