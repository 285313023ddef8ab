//! The spatial tree interface the engine consumes.
//!
//! The tree builder, its node pool, and the top-level leaf ownership map all
//! live outside this crate. The engine only walks the tree through this
//! trait, never touching a node's memory layout directly.

use super::particle::{ParticleIndex, TypeMask};

/// Index of a node within the tree's node pool.
///
/// Node pools conventionally place leaves below `num_particles` and
/// internal/pseudo nodes above it; this crate does not care which
/// numbering scheme is used, it only asks [`Tree`] for a node's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// The rank that owns a pseudo-node's remote sub-domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rank(pub i32);

/// What kind of thing a [`NodeId`] currently refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf holding one or more local particles.
    Leaf,
    /// A placeholder for a remote sub-domain; cannot be descended locally.
    Pseudo,
    /// An internal node with local children.
    Internal,
    /// An internal node that is also part of the shallow, globally
    /// replicated top-tree.
    TopLevelInternal,
}

impl NodeKind {
    pub fn is_internal(self) -> bool {
        matches!(self, NodeKind::Internal | NodeKind::TopLevelInternal)
    }
}

/// A read-only view of one tree node's geometry and linkage, as returned by
/// [`Tree::node`].
#[derive(Debug, Clone, Copy)]
pub struct NodeView {
    pub kind: NodeKind,
    pub center: [f64; 3],
    pub half_side: f64,
    /// Node to visit next if this node is skipped entirely (culled, or a
    /// pseudo-node already exported).
    pub sibling: Option<NodeId>,
    /// First child, valid only when `kind.is_internal()`.
    pub first_child: Option<NodeId>,
    /// Number of particles contained transitively under this node.
    pub occupancy: u32,
    /// True for nodes within the top-tree (replicated across all ranks).
    pub top_level: bool,
    /// Cached maximum smoothing length among particles under this node,
    /// used by symmetric walks. `None` means not cached / not valid.
    pub hmax: Option<f64>,
}

/// Fixed length of a query's node-list. The coalescing rule in the Export
/// Table depends on this being exactly 2; changing it is a protocol break,
/// not a tunable.
pub const NODE_LIST_LENGTH: usize = 2;

/// Up to [`NODE_LIST_LENGTH`] remote entry nodes a query needs visited on a
/// peer. Unused slots are `None` (the source protocol's `-1` sentinel).
pub type NodeList = [Option<NodeId>; NODE_LIST_LENGTH];

/// Mapping from a pseudo-node identifier to its owning rank and the node id
/// on that remote rank which should be the entry point of a ghost walk.
pub trait TopLeafMap: Send + Sync {
    /// Resolves a pseudo-node to (owner rank, remote entry node).
    ///
    /// Panics (engine contract: fatal, `TreeWalkError::Protocol`) if `node`
    /// is not actually a pseudo-node reference known to the map.
    fn resolve(&self, node: NodeId) -> (Rank, NodeId);
}

/// The tree the engine walks.
///
/// A [`Tree`] owns no mutable engine state; the engine treats it as a
/// read-only, thread-shared structure for the duration of a walk.
pub trait Tree: Send + Sync {
    /// The first node of the local tree (root of the walkable structure).
    fn first_node(&self) -> NodeId;

    /// One past the last valid node id; used for bounds assertions.
    fn last_node(&self) -> NodeId;

    /// Total number of local particles indexed by this tree.
    fn num_particles(&self) -> usize;

    /// Union of particle type tags present anywhere under this tree.
    fn mask(&self) -> TypeMask;

    /// Side length of the (cubic) periodic box, or `None` if the
    /// simulation is non-periodic.
    fn box_size(&self) -> Option<f64>;

    /// Returns a read-only view of a node's geometry and linkage.
    fn node(&self, id: NodeId) -> NodeView;

    /// Particle indices contained in a leaf node. Only valid when
    /// `node(id).kind == NodeKind::Leaf`.
    fn leaf_particles(&self, id: NodeId) -> &[ParticleIndex];

    /// The mapping from pseudo-node ids to remote owners.
    fn top_leaf_map(&self) -> &dyn TopLeafMap;

    /// Whether every node's cached `hmax` is currently valid. Symmetric
    /// walks require this to be `true` (engine contract, checked at
    /// walk start; violation is `TreeWalkError::Configuration`, fatal).
    fn hmax_valid(&self) -> bool;
}
