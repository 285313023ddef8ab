//! Domain traits consumed by the tree-walk engine.
//!
//! Everything in this module is an interface: the tree builder, the
//! particle table, and the kernel visitors are all implemented outside this
//! crate and outside `treewalk-engine`.

pub mod particle;
pub mod payload;
pub mod tree;
pub mod visitor;

pub use particle::{ParticleIndex, ParticleTable, TypeMask};
pub use payload::{assert_payload_size_aligned, QueryPayload, ResultPayload};
pub use tree::{NodeId, NodeKind, NodeList, NodeView, Rank, Tree, TopLeafMap, NODE_LIST_LENGTH};
pub use visitor::{NgbIterState, ReduceMode, Visitor, WalkMode};
