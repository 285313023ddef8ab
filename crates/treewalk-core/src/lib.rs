//! Treewalk Core - domain traits for the distributed tree-walk engine
//!
//! This crate provides the fundamental abstractions the tree-walk engine
//! in `treewalk-engine` is generic over:
//! - The particle table and spatial tree interfaces it consumes
//! - The query/result payload and visitor traits kernels implement
//! - The crate-wide error type

pub mod domain;
pub mod error;
pub mod geometry;

pub use domain::{
    assert_payload_size_aligned, NgbIterState, NodeId, NodeKind, NodeList, NodeView,
    ParticleIndex, ParticleTable, QueryPayload, Rank, ReduceMode, ResultPayload, Tree, TopLeafMap,
    TypeMask, Visitor, WalkMode, NODE_LIST_LENGTH,
};
pub use error::{Result, TreeWalkError};
