//! Synthetic domain implementations for exercising the tree-walk engine
//! without a production particle store or tree builder.

use std::cell::RefCell;

use treewalk_core::{
    NodeId, NodeKind, NodeList, NodeView, ParticleIndex, ParticleTable, QueryPayload, Rank,
    ResultPayload, Tree, TopLeafMap,
};

/// A flat, in-memory particle table backed by `Vec`s, with interior
/// mutability for `hsml`/garbage so it satisfies `ParticleTable: Send +
/// Sync` the same way a real struct-of-arrays store's per-particle locks
/// or atomics would.
pub struct FlatParticleTable {
    positions: Vec<[f64; 3]>,
    hsml: RefCell<Vec<f64>>,
    garbage: RefCell<Vec<bool>>,
    type_tags: Vec<u8>,
}

impl FlatParticleTable {
    pub fn new(positions: Vec<[f64; 3]>) -> Self {
        let n = positions.len();
        Self {
            positions,
            hsml: RefCell::new(vec![0.1; n]),
            garbage: RefCell::new(vec![false; n]),
            type_tags: vec![0; n],
        }
    }

    pub fn with_hsml(mut self, hsml: f64) -> Self {
        self.hsml = RefCell::new(vec![hsml; self.positions.len()]);
        self
    }

    pub fn set_garbage(&mut self, index: u32, garbage: bool) {
        self.garbage.borrow_mut()[index as usize] = garbage;
    }
}

impl ParticleTable for FlatParticleTable {
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn position(&self, index: ParticleIndex) -> [f64; 3] {
        self.positions[index.as_usize()]
    }

    fn type_tag(&self, index: ParticleIndex) -> u8 {
        self.type_tags[index.as_usize()]
    }

    fn is_garbage(&self, index: ParticleIndex) -> bool {
        self.garbage.borrow()[index.as_usize()]
    }

    fn hsml(&self, index: ParticleIndex) -> f64 {
        self.hsml.borrow()[index.as_usize()]
    }

    fn set_hsml(&self, index: ParticleIndex, value: f64) {
        self.hsml.borrow_mut()[index.as_usize()] = value;
    }

    fn id(&self, index: ParticleIndex) -> u64 {
        index.0 as u64
    }
}

/// A trivial tree: a single leaf node containing every particle, with no
/// pseudo-nodes and an unbounded (non-periodic) box. Useful for engine
/// unit tests that don't need real spatial structure.
pub struct SingleLeafTree {
    particles: Vec<ParticleIndex>,
}

struct NoRemoteDomains;

impl TopLeafMap for NoRemoteDomains {
    fn resolve(&self, node: NodeId) -> (Rank, NodeId) {
        panic!("SingleLeafTree has no pseudo-nodes to resolve (node {node:?})");
    }
}

impl SingleLeafTree {
    pub fn new(n: usize) -> Self {
        Self {
            particles: (0..n as u32).map(ParticleIndex).collect(),
        }
    }
}

impl Tree for SingleLeafTree {
    fn first_node(&self) -> NodeId {
        NodeId(0)
    }

    fn last_node(&self) -> NodeId {
        NodeId(1)
    }

    fn num_particles(&self) -> usize {
        self.particles.len()
    }

    fn mask(&self) -> treewalk_core::TypeMask {
        treewalk_core::TypeMask::ALL
    }

    fn box_size(&self) -> Option<f64> {
        None
    }

    fn node(&self, id: NodeId) -> NodeView {
        assert_eq!(id, NodeId(0), "SingleLeafTree has exactly one node");
        NodeView {
            kind: NodeKind::Leaf,
            center: [0.0; 3],
            half_side: f64::MAX / 4.0,
            sibling: None,
            first_child: None,
            occupancy: self.particles.len() as u32,
            top_level: false,
            hmax: None,
        }
    }

    fn leaf_particles(&self, id: NodeId) -> &[ParticleIndex] {
        assert_eq!(id, NodeId(0));
        &self.particles
    }

    fn top_leaf_map(&self) -> &dyn TopLeafMap {
        &NoRemoteDomains
    }

    fn hmax_valid(&self) -> bool {
        false
    }
}

/// Maps exactly two pseudo-node ids (`NodeId(1)` and `NodeId(2)`) to
/// caller-chosen `(Rank, NodeId)` destinations; any other node panics,
/// matching the real map's "unknown node id is a protocol violation"
/// contract.
struct TwoEntryMap {
    a: (Rank, NodeId),
    b: (Rank, NodeId),
}

impl TopLeafMap for TwoEntryMap {
    fn resolve(&self, node: NodeId) -> (Rank, NodeId) {
        match node.0 {
            1 => self.a,
            2 => self.b,
            _ => panic!("TwoDomainTree has no pseudo-node {node:?}"),
        }
    }
}

/// A tree with one local leaf and two real pseudo-nodes, for exercising
/// the Top-tree Runner's export enumeration, coalescing, and overflow
/// handling against real `NodeKind::Pseudo` nodes rather than
/// `SingleLeafTree`'s none-at-all.
///
/// Node layout: `NodeId(0)` is the local leaf holding every particle,
/// `NodeId(1)` and `NodeId(2)` are pseudo-nodes chained off its sibling
/// pointer (the shape `enumerate_exports` expects: leaf first, then the
/// top-tree's remaining siblings). Each pseudo-node's box can be placed
/// independently, so a test can make one node close enough to always
/// open and the other far enough to cull, or both close enough to open
/// together.
pub struct TwoDomainTree {
    particles: Vec<ParticleIndex>,
    map: TwoEntryMap,
    box_a: ([f64; 3], f64),
    box_b: ([f64; 3], f64),
}

impl TwoDomainTree {
    /// `entry_a`/`entry_b` are the remote node ids a ghost walk should
    /// start from on `rank_a`/`rank_b` respectively. Both pseudo-node
    /// boxes default to centered on the origin with a half-side of `0.5`,
    /// i.e. both open for any query whose search radius reaches past
    /// `0.5`; use [`Self::with_boxes`] to place them apart instead.
    pub fn new(n: usize, rank_a: Rank, entry_a: NodeId, rank_b: Rank, entry_b: NodeId) -> Self {
        Self {
            particles: (0..n as u32).map(ParticleIndex).collect(),
            map: TwoEntryMap {
                a: (rank_a, entry_a),
                b: (rank_b, entry_b),
            },
            box_a: ([0.0; 3], 0.5),
            box_b: ([0.0; 3], 0.5),
        }
    }

    pub fn with_boxes(mut self, box_a: ([f64; 3], f64), box_b: ([f64; 3], f64)) -> Self {
        self.box_a = box_a;
        self.box_b = box_b;
        self
    }
}

impl Tree for TwoDomainTree {
    fn first_node(&self) -> NodeId {
        NodeId(0)
    }

    fn last_node(&self) -> NodeId {
        NodeId(3)
    }

    fn num_particles(&self) -> usize {
        self.particles.len()
    }

    fn mask(&self) -> treewalk_core::TypeMask {
        treewalk_core::TypeMask::ALL
    }

    fn box_size(&self) -> Option<f64> {
        None
    }

    fn node(&self, id: NodeId) -> NodeView {
        match id.0 {
            0 => NodeView {
                kind: NodeKind::Leaf,
                center: [0.0; 3],
                half_side: f64::MAX / 4.0,
                sibling: Some(NodeId(1)),
                first_child: None,
                occupancy: self.particles.len() as u32,
                top_level: false,
                hmax: None,
            },
            1 => NodeView {
                kind: NodeKind::Pseudo,
                center: self.box_a.0,
                half_side: self.box_a.1,
                sibling: Some(NodeId(2)),
                first_child: None,
                occupancy: 0,
                top_level: true,
                hmax: None,
            },
            2 => NodeView {
                kind: NodeKind::Pseudo,
                center: self.box_b.0,
                half_side: self.box_b.1,
                sibling: None,
                first_child: None,
                occupancy: 0,
                top_level: true,
                hmax: None,
            },
            _ => panic!("TwoDomainTree has exactly three nodes, got {id:?}"),
        }
    }

    fn leaf_particles(&self, id: NodeId) -> &[ParticleIndex] {
        assert_eq!(id, NodeId(0), "only NodeId(0) is a leaf in TwoDomainTree");
        &self.particles
    }

    fn top_leaf_map(&self) -> &dyn TopLeafMap {
        &self.map
    }

    fn hmax_valid(&self) -> bool {
        false
    }
}

/// A minimal query payload carrying only the engine-owned fields, for
/// tests that don't need kernel-specific data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestQuery {
    position: [f64; 3],
    node_list: NodeList,
}

impl QueryPayload for TestQuery {
    fn new(position: [f64; 3], node_list: NodeList) -> Self {
        Self { position, node_list }
    }

    fn position(&self) -> [f64; 3] {
        self.position
    }

    fn node_list(&self) -> NodeList {
        self.node_list
    }
}

/// A minimal result payload with a neighbour counter, enough to exercise
/// `reduce` and the adaptive hsml loop without a real kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestResult {
    pub neighbour_count: u32,
    debug_source_id: u64,
}

impl ResultPayload for TestResult {
    fn debug_source_id(&self) -> u64 {
        self.debug_source_id
    }

    fn set_debug_source_id(&mut self, id: u64) {
        self.debug_source_id = id;
    }
}

/// Reference neighbour count computed by brute-force all-pairs distance,
/// for cross-checking the tree-walk engine's output in tests.
pub fn brute_force_neighbour_count(
    particles: &FlatParticleTable,
    origin: ParticleIndex,
    hsml: f64,
) -> u32 {
    let pos = particles.position(origin);
    let mut count = 0;
    for i in 0..particles.len() {
        let candidate = ParticleIndex(i as u32);
        if candidate == origin || particles.is_garbage(candidate) {
            continue;
        }
        let other = particles.position(candidate);
        let d2 = (0..3)
            .map(|k| (pos[k] - other[k]).powi(2))
            .sum::<f64>();
        if d2 <= hsml * hsml {
            count += 1;
        }
    }
    count
}
