//! `capra-graph` — the symbolic episode graph.
//!
//! The world graph is a *fast index and planner substrate*: small tagged
//! nodes ("bindings") joined by labeled directed edges expressing weak
//! episodic causality (`then`).  Rich content lives in column engrams; a
//! binding only ever holds pointers.
//!
//! # Terminology
//!
//! - **Binding** — one node; the *binding together* of facts, pointers,
//!   time, and provenance into a coherent moment.  Carries tags, outgoing
//!   edges, free-form meta, and engram pointers.
//! - **Tag** — a typed token: `Pred` (plannable fact), `Cue` (evidence
//!   only, never a planner goal), `Anchor` (orientation node such as NOW),
//!   `Action` (action-family node).
//! - **Anchor** — a named binding tracked in the anchors map; `NOW` is the
//!   planner's usual start point.  `LATEST` is an implicit cursor over the
//!   most recently created binding, used for `Attach::Latest` auto-links.
//!
//! # Crate layout
//!
//! | Module        | Contents                                             |
//! |---------------|------------------------------------------------------|
//! | [`tag`]       | `Tag`, `TagFamily`                                   |
//! | [`lexicon`]   | `Stage`, `TagPolicy`, `TagLexicon`                   |
//! | [`binding`]   | `Binding`, `Edge`, `EngramRef`, `Meta`               |
//! | [`graph`]     | `WorldGraph` write/read operations + invariants      |
//! | [`plan`]      | `Planner` (BFS / Dijkstra) + path search             |
//! | [`analytics`] | edge-label analytics, pretty-path rendering          |
//! | [`snapshot`]  | serde persistence model                              |

pub mod analytics;
pub mod binding;
pub mod error;
pub mod graph;
pub mod lexicon;
pub mod plan;
pub mod snapshot;
pub mod tag;


pub use binding::{Binding, Edge, EngramRef, Meta};
pub use error::{GraphError, GraphResult};
pub use graph::{Attach, MemoryMode, WorldGraph};
pub use lexicon::{Stage, TagLexicon, TagPolicy};
pub use plan::Planner;
pub use snapshot::GraphSnapshot;
pub use tag::{Tag, TagFamily};
